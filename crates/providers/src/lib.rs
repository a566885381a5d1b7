pub mod gemini;

use async_trait::async_trait;
use shared::AssistError;

/// A remote model that turns one prompt into one reply.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, api_key: &str, prompt: &str) -> Result<String, AssistError>;
}
