//! Failure taxonomy for asking the remote assistant.

/// Everything that can go wrong between a user question and an answer.
///
/// None of these are fatal; the panel turns each one into an apology message.
#[derive(Debug, thiserror::Error)]
pub enum AssistError {
    #[error("API key not found. Please set your Gemini API key in Settings.")]
    MissingCredential,

    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Response blocked: {reason}")]
    Blocked { reason: String },

    #[error("No response generated")]
    NoCandidates,

    #[error("Empty response received")]
    EmptyResponse,

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl AssistError {
    /// True when the request never left the machine.
    pub fn is_local(&self) -> bool {
        matches!(self, AssistError::MissingCredential | AssistError::Storage(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_shows_server_message() {
        let err = AssistError::Api {
            status: 400,
            message: "API key not valid".into(),
        };
        assert_eq!(err.to_string(), "API key not valid");
        assert!(!err.is_local());
    }

    #[test]
    fn test_blocked_mentions_reason() {
        let err = AssistError::Blocked {
            reason: "SAFETY".into(),
        };
        assert_eq!(err.to_string(), "Response blocked: SAFETY");
        assert!(AssistError::MissingCredential.is_local());
    }
}
