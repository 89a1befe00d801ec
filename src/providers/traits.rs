use async_trait::async_trait;
use thiserror::Error;

/// Failure of the hosted model. Reasons are carried verbatim from the transport or
/// the response body.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("LLM unavailable: {0}")]
    Unavailable(String),
    #[error("LLM returned a malformed response: {0}")]
    MalformedResponse(String),
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;

    fn model_name(&self) -> &str;
}
