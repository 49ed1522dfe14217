//! LLM completion contract
//!
//! Routing escalation, planning and analysis tools all talk to a model
//! through [`LlmClient`]. The model name and client travel together as an
//! [`LlmContext`] so agents can rebind per call.

use crate::models::ChatMessage;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub mod openai;
pub use openai::OpenAiClient;

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        model: &str,
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Result<String>;
}

/// A client bound to the model chosen for the current request.
#[derive(Clone)]
pub struct LlmContext {
    client: Arc<dyn LlmClient>,
    model: String,
}

impl LlmContext {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Result<String> {
        self.client
            .complete(messages, &self.model, temperature, max_tokens)
            .await
    }
}

impl std::fmt::Debug for LlmContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmContext")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}
