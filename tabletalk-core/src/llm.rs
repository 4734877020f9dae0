use serde::{Deserialize, Serialize};

use crate::TabletalkError;

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct LlmRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl LlmRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct LlmResponse {
    pub content: String,
}

/// Chat completion capability. Providers must report failures as errors
/// rather than returning empty content, so callers can tell a provider
/// outage apart from a valid-but-empty completion.
#[async_trait::async_trait]
pub trait ChatLlm: Send + Sync {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, TabletalkError>;
}

#[async_trait::async_trait]
impl<L: ChatLlm + ?Sized> ChatLlm for std::sync::Arc<L> {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, TabletalkError> {
        (**self).complete(request).await
    }
}
