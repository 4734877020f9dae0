//! OpenAI-compatible chat completion client.
//!
//! Works against any provider speaking OpenAI's chat completions format
//! (OpenAI, DeepSeek, Together, local gateways, ...).

mod openai_compatible;

pub use openai_compatible::{
    ChatCompletionRequest, ChatCompletionResponse, OpenAiCompatibleBuilder,
    OpenAiCompatibleClient,
};
pub use tabletalk_core::{ChatLlm, LlmRequest, LlmResponse, Message, Role};
