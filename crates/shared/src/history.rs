//! Records persisted per page: chat messages, code snapshots and the API credential.
//!
//! Field names on the wire match what earlier releases wrote to storage, so an
//! existing `chatHistory` / `geminiCodeHistory` document keeps loading.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Records that belong to exactly one page partition.
pub trait PagePartitioned {
    fn page_url(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sender {
    #[serde(rename = "You")]
    User,
    #[serde(rename = "Gemini")]
    Assistant,
}

impl Sender {
    pub fn display_name(&self) -> &'static str {
        match self {
            Sender::User => "You",
            Sender::Assistant => "Gemini",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: Sender,
    pub text: String,
    pub timestamp: String,
    #[serde(rename = "page")]
    pub page_url: String,
}

impl ChatMessage {
    pub fn new(sender: Sender, text: impl Into<String>, page_url: impl Into<String>) -> Self {
        Self {
            sender,
            text: text.into(),
            timestamp: now_iso8601(),
            page_url: page_url.into(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.sender == Sender::User
    }
}

impl PagePartitioned for ChatMessage {
    fn page_url(&self) -> &str {
        &self.page_url
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSnapshot {
    pub timestamp: String,
    pub code: String,
    /// Where the code was read from, e.g. `monaco-editor`
    #[serde(rename = "element")]
    pub source_label: String,
    #[serde(rename = "url")]
    pub page_url: String,
    /// Lower-cased label of the run/test/submit control that forced the capture
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl CodeSnapshot {
    pub fn new(
        code: impl Into<String>,
        source_label: impl Into<String>,
        page_url: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: now_iso8601(),
            code: code.into(),
            source_label: source_label.into(),
            page_url: page_url.into(),
            action: None,
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }
}

impl PagePartitioned for CodeSnapshot {
    fn page_url(&self) -> &str {
        &self.page_url
    }
}

/// What the assistant knows about the problem on the current page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemContext {
    pub title: String,
    pub description: String,
    pub url: String,
}

impl ProblemContext {
    pub fn has_description(&self, min_len: usize) -> bool {
        self.description.chars().count() > min_len
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub api_key: String,
}

impl Credential {
    /// Returns `None` for keys that are blank after trimming.
    pub fn new(api_key: &str) -> Option<Self> {
        let trimmed = api_key.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self {
                api_key: trimmed.to_string(),
            })
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("api_key", &"<redacted>")
            .finish()
    }
}

fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
