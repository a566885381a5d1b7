//! Agent Host - the coding assistant behind the panel
//!
//! This crate decides what to do with a chat message:
//! - Classify it (greeting, off-topic, or a real coding question)
//! - Build the prompt from the scraped problem and the learner's code
//! - Ask the model and record the answer in the page's transcript

pub mod assistant;
pub mod classifier;
pub mod editor;
pub mod prompts;
pub mod session;

pub use assistant::Assistant;
pub use classifier::{classify, Category, Classification};
pub use editor::EditorWatch;
pub use prompts::{build_prompt, AskContext};
pub use session::{AskJob, AssistantSession, Submission};
