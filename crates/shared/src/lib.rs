pub mod error;
pub mod history;

pub use error::AssistError;
pub use history::{ChatMessage, CodeSnapshot, Credential, PagePartitioned, ProblemContext, Sender};

pub mod settings {
    use serde::{Deserialize, Serialize};

    /// Sampling parameters forwarded verbatim as `generationConfig`.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    pub struct GenerationSettings {
        pub temperature: f32,
        pub top_k: u32,
        pub top_p: f32,
        pub max_output_tokens: u32,
    }

    impl Default for GenerationSettings {
        fn default() -> Self {
            Self {
                temperature: 0.2,
                top_k: 40,
                top_p: 0.95,
                max_output_tokens: 2048,
            }
        }
    }

    /// Length thresholds used when picking problem text out of a page
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    pub struct ScrapeSettings {
        /// A description candidate must be longer than this many chars
        pub min_description_len: usize,
        /// Paragraphs at or below this length are skipped by the paragraph fallback
        pub min_paragraph_len: usize,
        /// Selected text must be longer than this to replace the scraped problem
        pub min_selection_len: usize,
    }

    impl Default for ScrapeSettings {
        fn default() -> Self {
            Self {
                min_description_len: 100,
                min_paragraph_len: 30,
                min_selection_len: 50,
            }
        }
    }

    /// Bounds for the "wait until the problem has rendered" poll
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    pub struct WatchSettings {
        pub poll_interval_ms: u64,
        pub timeout_ms: u64,
    }

    impl Default for WatchSettings {
        fn default() -> Self {
            Self {
                poll_interval_ms: 1_000,
                timeout_ms: 30_000,
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    pub struct AssistantSettings {
        pub gemini_model: String, // e.g., "gemini-2.0-flash"
        pub api_endpoint: String,
        pub generation: GenerationSettings,
        pub scrape: ScrapeSettings,
        pub watch: WatchSettings,
        /// Quiet period before an editor change is recorded as a snapshot
        pub code_debounce_ms: u64,
        pub dark_mode: bool,
    }

    impl Default for AssistantSettings {
        fn default() -> Self {
            Self {
                gemini_model: "gemini-2.0-flash".into(),
                api_endpoint: "https://generativelanguage.googleapis.com/v1beta".into(),
                generation: GenerationSettings::default(),
                scrape: ScrapeSettings::default(),
                watch: WatchSettings::default(),
                code_debounce_ms: 500,
                dark_mode: true,
            }
        }
    }

}
