use std::time::Duration;

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

use tabletalk_core::{ChatLlm, LlmRequest, LlmResponse, Message, TabletalkError};

/// Request body for the chat completions endpoint.
#[derive(Serialize, Debug, Clone)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    pub stream: bool,
}

/// Non-streaming response from the chat completions endpoint.
#[derive(Deserialize, Debug, Clone)]
pub struct ChatCompletionResponse {
    pub choices: Vec<Choice>,
    pub usage: Option<Usage>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Choice {
    pub message: ResponseMessage,
    pub finish_reason: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ResponseMessage {
    pub role: String,
    pub content: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// OpenAI-style error response.
#[derive(Deserialize, Debug, Clone)]
struct OpenAiError {
    error: ErrorDetail,
}

#[derive(Deserialize, Debug, Clone)]
struct ErrorDetail {
    message: String,
}

#[derive(Clone)]
pub struct OpenAiCompatibleClient {
    base_url: Url,
    api_key: Option<SecretString>,
    model: String,
    temperature: Option<f32>,
    http: Client,
}

pub struct OpenAiCompatibleBuilder {
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
    temperature: Option<f32>,
    timeout: Duration,
}

impl OpenAiCompatibleClient {
    pub fn builder(base_url: impl Into<String>, model: impl Into<String>) -> OpenAiCompatibleBuilder {
        OpenAiCompatibleBuilder {
            base_url: base_url.into(),
            api_key: None,
            model: model.into(),
            temperature: None,
            timeout: Duration::from_secs(120),
        }
    }
}

impl OpenAiCompatibleBuilder {
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::new(api_key.into()));
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<OpenAiCompatibleClient, TabletalkError> {
        let base_url = Url::parse(&self.base_url)
            .map_err(|err| TabletalkError::InvalidConfig(format!("base_url: {err}")))?;
        let http = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|err| TabletalkError::LlmProvider(err.to_string()))?;
        Ok(OpenAiCompatibleClient {
            base_url,
            api_key: self.api_key,
            model: self.model,
            temperature: self.temperature,
            http,
        })
    }
}

#[async_trait::async_trait]
impl ChatLlm for OpenAiCompatibleClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, TabletalkError> {
        let LlmRequest {
            model,
            messages,
            temperature,
        } = request;
        let model = if model.is_empty() {
            self.model.clone()
        } else {
            model
        };
        let body = ChatCompletionRequest {
            model,
            messages,
            temperature: temperature.or(self.temperature),
            stream: false,
        };

        let url = self
            .base_url
            .join("chat/completions")
            .map_err(|err| TabletalkError::InvalidConfig(err.to_string()))?;
        let mut builder = self.http.post(url).json(&body);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key.expose_secret());
        }

        let response = builder
            .send()
            .await
            .map_err(|err| TabletalkError::LlmProvider(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<OpenAiError>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(TabletalkError::LlmProvider(format!("{status}: {detail}")));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|err| TabletalkError::LlmProvider(err.to_string()))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| TabletalkError::LlmProvider("response carried no choices".into()))?;

        // Empty content is a valid completion, distinct from provider errors.
        Ok(LlmResponse {
            content: choice.message.content.unwrap_or_default(),
        })
    }
}
