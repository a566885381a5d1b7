//! One question in, one answer out.

use crate::prompts::{build_prompt, AskContext};
use providers::gemini::GeminiClient;
use providers::CompletionProvider;
use services::StorageAdapter;
use shared::settings::AssistantSettings;
use shared::AssistError;
use std::sync::Arc;
use tracing::{error, info};

/// Sends questions to the model with the page context attached.
///
/// There is no retry, cache or extra timeout: a failed call is reported once
/// and the caller decides what to show.
#[derive(Clone)]
pub struct Assistant {
    storage: StorageAdapter,
    provider: Arc<dyn CompletionProvider>,
}

impl Assistant {
    pub fn new(storage: StorageAdapter, provider: Arc<dyn CompletionProvider>) -> Self {
        Self { storage, provider }
    }

    /// Assistant backed by Gemini as configured in `settings`.
    pub fn gemini(storage: StorageAdapter, settings: &AssistantSettings) -> Result<Self, AssistError> {
        let client = GeminiClient::new(settings)?;
        Ok(Self::new(storage, Arc::new(client)))
    }

    pub async fn ask(&self, message: &str, context: &AskContext) -> Result<String, AssistError> {
        let credential = self
            .storage
            .load_credential()?
            .ok_or(AssistError::MissingCredential)?;

        let prompt = build_prompt(message, context);
        info!(
            "Asking about '{}' ({} prompt chars)",
            context.problem.title,
            prompt.len()
        );
        match self.provider.complete(&credential.api_key, &prompt).await {
            Ok(text) => Ok(text),
            Err(e) => {
                error!("Gemini API Error: {}", e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use shared::{Credential, ProblemContext};

    #[derive(Default)]
    struct RecordingProvider {
        calls: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl CompletionProvider for RecordingProvider {
        async fn complete(&self, api_key: &str, prompt: &str) -> Result<String, AssistError> {
            self.calls.lock().push((api_key.to_string(), prompt.to_string()));
            if self.fail {
                Err(AssistError::Blocked {
                    reason: "SAFETY".into(),
                })
            } else {
                Ok("Sort first, then use two pointers.".into())
            }
        }
    }

    fn context() -> AskContext {
        AskContext {
            problem: ProblemContext {
                title: "Two Sum".into(),
                description: "Find two numbers.".into(),
                url: "https://x.test/two-sum".into(),
            },
            editor_code: None,
        }
    }

    #[tokio::test]
    async fn test_missing_credential_skips_provider() {
        let provider = Arc::new(RecordingProvider::default());
        let assistant = Assistant::new(StorageAdapter::in_memory(), provider.clone());

        let err = assistant.ask("fix my loop", &context()).await.unwrap_err();
        assert!(matches!(err, AssistError::MissingCredential));
        assert!(provider.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_ask_passes_key_and_prompt() {
        let storage = StorageAdapter::in_memory();
        storage
            .save_credential(&Credential::new("key-1").unwrap())
            .unwrap();
        let provider = Arc::new(RecordingProvider::default());
        let assistant = Assistant::new(storage, provider.clone());

        let answer = assistant.ask("fix my loop", &context()).await.unwrap();
        assert_eq!(answer, "Sort first, then use two pointers.");

        let calls = provider.calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "key-1");
        assert!(calls[0].1.contains("User Question: fix my loop"));
        assert!(calls[0].1.contains("Title: Two Sum"));
    }

    #[tokio::test]
    async fn test_provider_failure_is_not_retried() {
        let storage = StorageAdapter::in_memory();
        storage
            .save_credential(&Credential::new("key-1").unwrap())
            .unwrap();
        let provider = Arc::new(RecordingProvider {
            fail: true,
            ..RecordingProvider::default()
        });
        let assistant = Assistant::new(storage, provider.clone());

        let err = assistant.ask("fix my loop", &context()).await.unwrap_err();
        assert_eq!(err.to_string(), "Response blocked: SAFETY");
        assert_eq!(provider.calls.lock().len(), 1);
    }
}
