//! Per-page conversation state.
//!
//! A session owns the transcript for one page URL and the scraped problem.
//! Everything it records goes to the durable tier, partitioned
//! by page, so reopening the same page restores the conversation.

use crate::classifier::{classify, classify_at, Category, Classification};
use crate::prompts::AskContext;
use anyhow::Result;
use services::storage::CHAT_HISTORY_KEY;
use services::{PageScraper, StorageAdapter, Tier};
use shared::{AssistError, ChatMessage, ProblemContext, Sender};
use tracing::{debug, info, warn};

pub const ANALYZED_GREETING: &str = "I've analyzed the current problem. How can I help you with it?";
pub const READY_MESSAGE: &str =
    "I'm ready to help with your coding problem. Please ask a specific question when you're ready.";
pub const SELECTION_EXTRACTED: &str =
    "Problem details extracted. You can now ask specific questions about this code problem.";
pub const PAGE_EXTRACTED: &str =
    "I've extracted the problem details. What specific coding question would you like to ask?";
pub const EXTRACT_FAILED: &str =
    "Could not extract problem details. Please select the problem text and try again.";

/// Text shown in the transcript when a request fails.
pub fn error_reply(error: &AssistError) -> String {
    if error.is_local() {
        format!("Sorry, I encountered an error: {}", error)
    } else {
        format!("Sorry, I encountered an error: Failed to get response: {}", error)
    }
}

/// What the caller has to do after [`AssistantSession::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Blank input; nothing was recorded.
    Ignored,
    /// Answered locally by the classifier; the reply is already in the transcript.
    Answered(Category),
    /// Needs the model. Hand this to `Assistant::ask` and pass the result to
    /// [`AssistantSession::finish`].
    Ask(AskJob),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AskJob {
    pub message: String,
    pub context: AskContext,
}

pub struct AssistantSession {
    storage: StorageAdapter,
    page_url: String,
    messages: Vec<ChatMessage>,
    problem: Option<ProblemContext>,
}

impl AssistantSession {
    /// Load `page_url`'s transcript.
    pub fn open(storage: StorageAdapter, page_url: &str) -> Result<Self> {
        let messages: Vec<ChatMessage> =
            storage.get_partition(Tier::Durable, CHAT_HISTORY_KEY, page_url)?;
        info!(
            "Opened session for {} ({} messages restored)",
            page_url,
            messages.len()
        );
        Ok(Self {
            storage,
            page_url: page_url.to_string(),
            messages,
            problem: None,
        })
    }

    pub fn page_url(&self) -> &str {
        &self.page_url
    }

    /// Transcript for the current page, oldest first.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn problem(&self) -> Option<&ProblemContext> {
        self.problem.as_ref()
    }

    pub fn set_problem(&mut self, problem: ProblemContext) {
        debug!("Caching problem '{}' for {}", problem.title, self.page_url);
        self.problem = Some(problem);
    }

    /// Append a message to the transcript and persist it.
    ///
    /// The in-memory transcript is updated even if the write fails.
    pub fn record(&mut self, sender: Sender, text: impl Into<String>) -> Result<&ChatMessage> {
        let message = ChatMessage::new(sender, text, self.page_url.clone());
        let saved = self
            .storage
            .append_record(Tier::Durable, CHAT_HISTORY_KEY, &message);
        self.messages.push(message);
        saved?;
        Ok(self.last_message())
    }

    /// Post the opening greeting. Every new panel gets one, after any restored
    /// conversation.
    pub fn greet(&mut self) -> Result<&ChatMessage> {
        self.record(Sender::Assistant, ANALYZED_GREETING)
    }

    /// Greet only if this page has no conversation yet.
    pub fn greet_if_new(&mut self) -> Result<bool> {
        if !self.messages.is_empty() {
            return Ok(false);
        }
        self.greet()?;
        Ok(true)
    }

    /// Route a typed message. `editor_code` is what the editor holds right now
    /// and goes into the prompt if the model is asked.
    pub fn submit(&mut self, text: &str, editor_code: Option<&str>) -> Result<Submission> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Submission::Ignored);
        }
        let classification = classify(text);
        self.route(text, classification, editor_code)
    }

    /// [`submit`](Self::submit) with a fixed local hour for greetings.
    pub fn submit_at(
        &mut self,
        text: &str,
        hour: u32,
        editor_code: Option<&str>,
    ) -> Result<Submission> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Submission::Ignored);
        }
        let classification = classify_at(text, hour);
        self.route(text, classification, editor_code)
    }

    fn route(
        &mut self,
        text: &str,
        classification: Classification,
        editor_code: Option<&str>,
    ) -> Result<Submission> {
        self.record(Sender::User, text)?;
        if let Some(canned) = classification.canned_response() {
            debug!("Answered locally as {:?}", classification.category);
            let canned = canned.to_string();
            self.record(Sender::Assistant, canned)?;
            return Ok(Submission::Answered(classification.category));
        }
        Ok(Submission::Ask(AskJob {
            message: text.to_string(),
            context: self.ask_context(editor_code),
        }))
    }

    /// The problem and editor contents that go with a question right now.
    pub fn ask_context(&self, editor_code: Option<&str>) -> AskContext {
        let problem = self.problem.clone().unwrap_or_else(|| ProblemContext {
            url: self.page_url.clone(),
            ..ProblemContext::default()
        });
        AskContext {
            problem,
            editor_code: editor_code.map(str::to_string),
        }
    }

    /// Record the model's answer, or the error in its place.
    pub fn finish(&mut self, result: Result<String, AssistError>) -> Result<&ChatMessage> {
        let text = match result {
            Ok(answer) => answer,
            Err(e) if e.is_local() => {
                warn!("Request for {} was not sent: {}", self.page_url, e);
                error_reply(&e)
            }
            Err(e) => {
                warn!("Request for {} failed: {}", self.page_url, e);
                error_reply(&e)
            }
        };
        self.record(Sender::Assistant, text)
    }

    /// Drop this page's transcript and post the ready message.
    pub fn clear(&mut self) -> Result<usize> {
        let removed =
            self.storage
                .clear_partition::<ChatMessage>(Tier::Durable, CHAT_HISTORY_KEY, &self.page_url)?;
        self.messages.clear();
        info!("Cleared {} messages for {}", removed, self.page_url);
        self.record(Sender::Assistant, READY_MESSAGE)?;
        Ok(removed)
    }

    /// Switch to another page: the problem cache is dropped and the new page's
    /// transcript loaded.
    pub fn navigate(&mut self, page_url: &str) -> Result<bool> {
        if page_url == self.page_url {
            return Ok(false);
        }
        info!("URL changed from {} to {}", self.page_url, page_url);
        self.messages = self
            .storage
            .get_partition(Tier::Durable, CHAT_HISTORY_KEY, page_url)?;
        self.page_url = page_url.to_string();
        self.problem = None;
        Ok(true)
    }

    /// Re-scrape the problem, preferring text the user selected.
    pub fn reextract(
        &mut self,
        scraper: &PageScraper,
        html: &str,
        selection: Option<&str>,
    ) -> Result<&ChatMessage> {
        let from_selection = selection.and_then(|s| {
            let title = self.problem.as_ref().map(|p| p.title.as_str()).unwrap_or("");
            scraper.from_selection(s, title, &self.page_url)
        });
        if let Some(problem) = from_selection {
            self.set_problem(problem);
            return self.record(Sender::Assistant, SELECTION_EXTRACTED);
        }

        let problem = scraper.extract_problem_context(html, &self.page_url);
        if problem.has_description(scraper.config().min_description_len) {
            self.set_problem(problem);
            self.record(Sender::Assistant, PAGE_EXTRACTED)
        } else {
            self.record(Sender::Assistant, EXTRACT_FAILED)
        }
    }

    fn last_message(&self) -> &ChatMessage {
        // `record` pushes before calling this.
        &self.messages[self.messages.len() - 1]
    }
}
