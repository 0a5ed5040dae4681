//! LLM integration - OpenRouter API
//!
//! HTTP client for chat completions and the OpenAI-compatible request and
//! response types it speaks.

mod client;
mod types;

pub use client::{LlmClient, LlmClientBuilder};
pub use types::{
    ChatRequest, ChatResponse, Choice, FinishReason, LlmResponse, Message, MessageRole,
    ResponseFormat, Usage,
};
