pub mod claude;
pub mod parser;
pub mod prompts;
pub mod provider;

pub use claude::ClaudeProvider;
pub use provider::{CompletionRequest, LlmProvider};
