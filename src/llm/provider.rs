use async_trait::async_trait;

use crate::error::Result;

/// One prompt invocation. The system text declares the expected JSON output
/// schema; the prompt carries the per-call input.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            max_tokens: 2048,
        }
    }
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Returns the raw model text; callers parse it into their own schema.
    async fn complete(&self, request: CompletionRequest) -> Result<String>;

    fn name(&self) -> &str;
}
