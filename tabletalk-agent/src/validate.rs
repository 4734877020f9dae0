use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::schema::SchemaSummary;

/// A proposed SQL statement moving through the repair loop.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SqlCandidate {
    pub sql: String,
    pub status: ValidationStatus,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ValidationStatus {
    Unchecked,
    Valid,
    Invalid {
        reason: String,
        /// True for write statements: these terminate the turn instead of
        /// feeding the repair loop.
        policy_violation: bool,
    },
}

impl SqlCandidate {
    pub fn unchecked(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            status: ValidationStatus::Unchecked,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.status == ValidationStatus::Valid
    }
}

/// Statement kinds that are never allowed, regardless of schema. The agent
/// must not be able to mutate the database, so this is a hard policy, not
/// a repairable mistake.
const WRITE_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "CREATE", "TRUNCATE", "REPLACE", "ATTACH",
    "DETACH", "PRAGMA", "VACUUM", "REINDEX", "GRANT", "REVOKE", "MERGE",
];

const KEYWORDS: &[&str] = &[
    "SELECT", "FROM", "WHERE", "GROUP", "BY", "ORDER", "HAVING", "LIMIT", "OFFSET", "JOIN",
    "LEFT", "RIGHT", "FULL", "OUTER", "INNER", "CROSS", "NATURAL", "ON", "USING", "AS", "AND",
    "OR", "NOT", "IN", "IS", "NULL", "LIKE", "GLOB", "REGEXP", "ESCAPE", "BETWEEN", "CASE",
    "WHEN", "THEN", "ELSE", "END", "DISTINCT", "ALL", "UNION", "EXCEPT", "INTERSECT", "ASC",
    "DESC", "WITH", "RECURSIVE", "EXISTS", "CAST", "COLLATE", "TRUE", "FALSE",
    "CURRENT_DATE", "CURRENT_TIME", "CURRENT_TIMESTAMP", "NULLS", "FIRST", "LAST", "OVER",
    "PARTITION", "ROWS", "RANGE", "UNBOUNDED", "PRECEDING", "FOLLOWING", "CURRENT", "ROW",
    "FILTER", "VALUES",
];

#[derive(Clone, Debug, PartialEq)]
enum Tok {
    Word(String),
    Quoted(String),
    Str,
    Num,
    Sym(char),
}

impl Tok {
    fn ident(&self) -> Option<&str> {
        match self {
            Tok::Word(w) => Some(w),
            Tok::Quoted(q) => Some(q),
            _ => None,
        }
    }

    fn is_keyword(&self) -> bool {
        match self {
            Tok::Word(w) => KEYWORDS.contains(&w.to_ascii_uppercase().as_str()),
            _ => false,
        }
    }

    fn is_word(&self, keyword: &str) -> bool {
        matches!(self, Tok::Word(w) if w.eq_ignore_ascii_case(keyword))
    }
}

fn lex(sql: &str) -> Result<Vec<Tok>, String> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = sql.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c == '-' && chars.get(i + 1) == Some(&'-') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
        } else if c == '/' && chars.get(i + 1) == Some(&'*') {
            i += 2;
            loop {
                if i + 1 >= chars.len() {
                    return Err("unterminated block comment".to_string());
                }
                if chars[i] == '*' && chars[i + 1] == '/' {
                    i += 2;
                    break;
                }
                i += 1;
            }
        } else if c == '\'' {
            i += 1;
            loop {
                if i >= chars.len() {
                    return Err("unterminated string literal".to_string());
                }
                if chars[i] == '\'' {
                    if chars.get(i + 1) == Some(&'\'') {
                        i += 2;
                        continue;
                    }
                    i += 1;
                    break;
                }
                i += 1;
            }
            tokens.push(Tok::Str);
        } else if c == '"' || c == '`' || c == '[' {
            let close = match c {
                '"' => '"',
                '`' => '`',
                _ => ']',
            };
            let mut ident = String::new();
            i += 1;
            loop {
                if i >= chars.len() {
                    return Err("unterminated quoted identifier".to_string());
                }
                if chars[i] == close {
                    if close != ']' && chars.get(i + 1) == Some(&close) {
                        ident.push(close);
                        i += 2;
                        continue;
                    }
                    i += 1;
                    break;
                }
                ident.push(chars[i]);
                i += 1;
            }
            tokens.push(Tok::Quoted(ident));
        } else if c.is_ascii_digit() {
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '.') {
                i += 1;
            }
            tokens.push(Tok::Num);
        } else if c.is_alphabetic() || c == '_' {
            let mut word = String::new();
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                word.push(chars[i]);
                i += 1;
            }
            tokens.push(Tok::Word(word));
        } else {
            tokens.push(Tok::Sym(c));
            i += 1;
        }
    }

    Ok(tokens)
}

/// Names the statement references: real tables, CTEs, and aliases.
#[derive(Default)]
struct References {
    /// Tables named after FROM/JOIN that must exist in the schema.
    tables: Vec<String>,
    /// CTE and derived-table names, valid as table references with
    /// trusted columns.
    ctes: HashSet<String>,
    /// alias (lowercase) -> table name it stands for.
    aliases: HashMap<String, String>,
    /// Identifiers that are output aliases or otherwise locally defined.
    defined: HashSet<String>,
}

fn gather_references(tokens: &[Tok]) -> References {
    let mut refs = References::default();

    // CTE names: `WITH [RECURSIVE] name AS (...)`, comma separated.
    let mut i = 0;
    while i < tokens.len() {
        if tokens[i].is_word("WITH") {
            let mut j = i + 1;
            if tokens.get(j).map(|t| t.is_word("RECURSIVE")) == Some(true) {
                j += 1;
            }
            loop {
                let Some(name) = tokens.get(j).and_then(Tok::ident) else {
                    break;
                };
                refs.ctes.insert(name.to_ascii_lowercase());
                // skip to the matching close paren of `AS ( ... )`
                let mut k = j + 1;
                while k < tokens.len() && tokens[k] != Tok::Sym('(') {
                    k += 1;
                }
                let mut depth = 0;
                while k < tokens.len() {
                    match tokens[k] {
                        Tok::Sym('(') => depth += 1,
                        Tok::Sym(')') => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    k += 1;
                }
                if tokens.get(k + 1) == Some(&Tok::Sym(',')) {
                    j = k + 2;
                } else {
                    break;
                }
            }
        }
        i += 1;
    }

    // Table references and their aliases.
    let mut i = 0;
    while i < tokens.len() {
        let is_from = tokens[i].is_word("FROM");
        let is_join = tokens[i].is_word("JOIN");
        if is_from || is_join {
            let mut j = i + 1;
            loop {
                match tokens.get(j) {
                    // Derived table: its FROM is scanned on its own pass;
                    // record the alias after the closing paren, columns
                    // trusted like a CTE's.
                    Some(Tok::Sym('(')) => {
                        let mut k = j;
                        let mut depth = 0;
                        while k < tokens.len() {
                            match tokens[k] {
                                Tok::Sym('(') => depth += 1,
                                Tok::Sym(')') => {
                                    depth -= 1;
                                    if depth == 0 {
                                        break;
                                    }
                                }
                                _ => {}
                            }
                            k += 1;
                        }
                        let mut a = k + 1;
                        if tokens.get(a).map(|t| t.is_word("AS")) == Some(true) {
                            a += 1;
                        }
                        if let Some(alias_tok) = tokens.get(a) {
                            if let Some(alias) = alias_tok.ident() {
                                if !alias_tok.is_keyword() {
                                    refs.ctes.insert(alias.to_ascii_lowercase());
                                }
                            }
                        }
                        break;
                    }
                    Some(tok) if tok.ident().is_some() && !tok.is_keyword() => {
                        let mut name = tok.ident().unwrap_or_default().to_string();
                        // schema-qualified: keep the last segment
                        while tokens.get(j + 1) == Some(&Tok::Sym('.')) {
                            if let Some(next) = tokens.get(j + 2).and_then(Tok::ident) {
                                name = next.to_string();
                                j += 2;
                            } else {
                                break;
                            }
                        }
                        if !refs.ctes.contains(&name.to_ascii_lowercase()) {
                            refs.tables.push(name.clone());
                        }
                        // optional alias
                        let mut k = j + 1;
                        if tokens.get(k).map(|t| t.is_word("AS")) == Some(true) {
                            k += 1;
                        }
                        if let Some(alias_tok) = tokens.get(k) {
                            if let Some(alias) = alias_tok.ident() {
                                if !alias_tok.is_keyword() {
                                    refs.aliases
                                        .insert(alias.to_ascii_lowercase(), name.clone());
                                    k += 1;
                                }
                            }
                        }
                        // comma-separated table list only applies to FROM
                        if is_from && tokens.get(k) == Some(&Tok::Sym(',')) {
                            j = k + 1;
                            continue;
                        }
                    }
                    _ => {}
                }
                break;
            }
        }
        i += 1;
    }

    // Output aliases: `AS name`, plus implicit aliases directly following a
    // value expression (`COUNT(x) total`).
    for (index, token) in tokens.iter().enumerate() {
        if token.is_word("AS") {
            if let Some(name) = tokens.get(index + 1).and_then(Tok::ident) {
                refs.defined.insert(name.to_ascii_lowercase());
            }
        }
        if let Some(name) = token.ident() {
            if token.is_keyword() {
                continue;
            }
            let follows_value = matches!(
                tokens.get(index.wrapping_sub(1)),
                Some(Tok::Sym(')')) | Some(Tok::Str) | Some(Tok::Num)
            ) && index > 0;
            if follows_value {
                refs.defined.insert(name.to_ascii_lowercase());
            }
        }
    }

    refs
}

/// Syntactic and schema validation with a hard read-only policy.
#[derive(Clone, Debug, Default)]
pub struct SqlValidator;

impl SqlValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, candidate: &SqlCandidate, schema: &SchemaSummary) -> SqlCandidate {
        let status = self.check(&candidate.sql, schema);
        SqlCandidate {
            sql: candidate.sql.clone(),
            status,
        }
    }

    fn check(&self, sql: &str, schema: &SchemaSummary) -> ValidationStatus {
        let sql = sql.trim();
        if sql.is_empty() {
            return invalid("empty statement");
        }

        let tokens = match lex(sql) {
            Ok(tokens) => tokens,
            Err(reason) => return invalid(reason),
        };
        if tokens.is_empty() {
            return invalid("empty statement");
        }

        // Policy first: a write statement is rejected outright even if it
        // would also fail syntax or schema checks.
        for (index, token) in tokens.iter().enumerate() {
            if let Tok::Word(word) = token {
                if WRITE_KEYWORDS.contains(&word.to_ascii_uppercase().as_str()) {
                    // REPLACE(x, y, z) and friends are scalar function
                    // calls, not write statements.
                    if tokens.get(index + 1) == Some(&Tok::Sym('(')) {
                        continue;
                    }
                    return ValidationStatus::Invalid {
                        reason: format!(
                            "write statement '{}' is not permitted; only read-only queries are allowed",
                            word.to_ascii_uppercase()
                        ),
                        policy_violation: true,
                    };
                }
            }
        }

        if let Some(reason) = structural_error(&tokens) {
            return invalid(reason);
        }

        let refs = gather_references(&tokens);

        for table in &refs.tables {
            if schema.table(table).is_none() {
                return invalid(format!("unknown table '{table}'"));
            }
        }

        if let Some(reason) = column_error(&tokens, &refs, schema) {
            return invalid(reason);
        }

        ValidationStatus::Valid
    }
}

fn invalid(reason: impl Into<String>) -> ValidationStatus {
    ValidationStatus::Invalid {
        reason: reason.into(),
        policy_violation: false,
    }
}

fn structural_error(tokens: &[Tok]) -> Option<String> {
    // Leading keyword must start a read query.
    let first = tokens
        .iter()
        .find(|t| !matches!(t, Tok::Sym('(')))?;
    match first {
        Tok::Word(w)
            if w.eq_ignore_ascii_case("SELECT") || w.eq_ignore_ascii_case("WITH") => {}
        Tok::Word(w) => {
            return Some(format!("statement must start with SELECT or WITH, got '{w}'"))
        }
        _ => return Some("statement must start with SELECT or WITH".to_string()),
    }

    let mut depth: i64 = 0;
    for (index, token) in tokens.iter().enumerate() {
        match token {
            Tok::Sym('(') => depth += 1,
            Tok::Sym(')') => {
                depth -= 1;
                if depth < 0 {
                    return Some("unbalanced parentheses".to_string());
                }
            }
            Tok::Sym(';') => {
                if index + 1 < tokens.len() {
                    return Some("multiple statements are not permitted".to_string());
                }
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Some("unbalanced parentheses".to_string());
    }
    None
}

fn column_error(tokens: &[Tok], refs: &References, schema: &SchemaSummary) -> Option<String> {
    // Union of columns of every referenced table, for bare references.
    let mut known_columns: HashSet<String> = HashSet::new();
    for table in &refs.tables {
        if let Some(summary) = schema.table(table) {
            for column in &summary.columns {
                known_columns.insert(column.name.to_ascii_lowercase());
            }
        }
    }

    let mut index = 0;
    while index < tokens.len() {
        let token = &tokens[index];
        let Some(name) = token.ident() else {
            index += 1;
            continue;
        };
        if token.is_keyword() {
            index += 1;
            continue;
        }

        let qualified = tokens.get(index + 1) == Some(&Tok::Sym('.'));
        if qualified {
            let lower = name.to_ascii_lowercase();
            let target_table = refs
                .aliases
                .get(&lower)
                .cloned()
                .or_else(|| schema.table(name).map(|t| t.name.clone()));

            let column_tok = tokens.get(index + 2);
            if refs.ctes.contains(&lower) {
                // CTE columns are not in the schema; trust them.
            } else if let Some(table) = target_table {
                if let Some(column) = column_tok.and_then(Tok::ident) {
                    let exists = schema
                        .table(&table)
                        .map(|t| t.column(column).is_some())
                        .unwrap_or(false);
                    if !exists {
                        return Some(format!("unknown column '{table}.{column}'"));
                    }
                }
                // `t.*` falls through: Sym('*') has no ident.
            } else {
                return Some(format!("unknown table or alias '{name}'"));
            }
            index += 3;
            continue;
        }

        // Bare identifier: skip function calls, table names, aliases, and
        // locally defined names; only check plausible column references.
        let lower = name.to_ascii_lowercase();
        let is_function_call = tokens.get(index + 1) == Some(&Tok::Sym('('));
        let preceded_by_dot = index > 0 && tokens[index - 1] == Tok::Sym('.');
        let after_as = index > 0 && tokens[index - 1].is_word("AS");
        let is_table_name = refs
            .tables
            .iter()
            .any(|t| t.eq_ignore_ascii_case(name));
        let is_alias = refs.aliases.contains_key(&lower) || refs.ctes.contains(&lower);
        let is_defined = refs.defined.contains(&lower);

        if !is_function_call
            && !preceded_by_dot
            && !after_as
            && !is_table_name
            && !is_alias
            && !is_defined
            && !refs.tables.is_empty()
            && !known_columns.contains(&lower)
        {
            return Some(format!("unknown column '{name}'"));
        }
        index += 1;
    }
    None
}
