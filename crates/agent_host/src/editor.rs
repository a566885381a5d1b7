//! Editor tracking for the loaded page.
//!
//! Lives as long as a page is loaded, independent of the assistant panel, so
//! edits and run/submit presses are logged whether or not the panel is open.

use anyhow::Result;
use services::code_history::{append_snapshot, load_code_history, run_action, CodeTracker};
use services::page_scraper::EDITOR_SOURCE_LABEL;
use services::StorageAdapter;
use shared::CodeSnapshot;
use std::time::{Duration, Instant};
use tracing::debug;

pub struct EditorWatch {
    storage: StorageAdapter,
    code: CodeTracker,
}

impl EditorWatch {
    /// Start tracking `page_url`, resuming after its stored history.
    pub fn open(storage: StorageAdapter, page_url: &str, debounce: Duration) -> Result<Self> {
        let history = load_code_history(&storage)?;
        Ok(Self {
            code: CodeTracker::new(page_url, debounce).resume(&history),
            storage,
        })
    }

    pub fn page_url(&self) -> &str {
        self.code.page_url()
    }

    /// What the editor holds right now, as far as we've been told.
    pub fn current_code(&self) -> Option<&str> {
        self.code.current_code()
    }

    pub fn has_pending(&self) -> bool {
        self.code.has_pending()
    }

    /// Note the editor's contents without logging them, e.g. starter code.
    pub fn seed(&mut self, code: &str) {
        self.code.seed(code);
    }

    pub fn observe(&mut self, code: &str, now: Instant) {
        self.code.observe_edit(code, EDITOR_SOURCE_LABEL, now);
    }

    /// Store a debounced edit whose quiet period has passed.
    pub fn poll(&mut self, now: Instant) -> Result<bool> {
        match self.code.poll(now) {
            Some(snapshot) => append_snapshot(&self.storage, snapshot),
            None => Ok(false),
        }
    }

    /// Capture immediately because the control labelled `label` was pressed.
    ///
    /// Labels that don't name a run/test/submit action are ignored.
    pub fn capture_for_action(&mut self, code: &str, label: &str) -> Result<bool> {
        let Some(action) = run_action(label) else {
            return Ok(false);
        };
        match self.code.capture_now(code, EDITOR_SOURCE_LABEL, Some(action)) {
            Some(snapshot) => append_snapshot(&self.storage, snapshot),
            None => Ok(false),
        }
    }

    /// Store a pending edit now, ignoring the timer.
    pub fn flush(&mut self) -> Result<bool> {
        match self.code.flush() {
            Some(snapshot) => append_snapshot(&self.storage, snapshot),
            None => Ok(false),
        }
    }

    /// Follow the editor to another page. Pending edits belong to the old page
    /// and are flushed first.
    pub fn switch_to(&mut self, page_url: &str) -> Result<bool> {
        if page_url == self.code.page_url() {
            return Ok(false);
        }
        self.flush()?;
        let history = load_code_history(&self.storage)?;
        let debounce = self.code.debounce();
        self.code = CodeTracker::new(page_url, debounce).resume(&history);
        debug!("Tracking editor on {}", page_url);
        Ok(true)
    }

    /// Snapshots stored for the tracked page.
    pub fn history(&self) -> Result<Vec<CodeSnapshot>> {
        Ok(load_code_history(&self.storage)?
            .into_iter()
            .filter(|s| s.page_url == self.code.page_url())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "https://x.test/problems/two-sum";

    fn open(storage: &StorageAdapter) -> EditorWatch {
        EditorWatch::open(storage.clone(), PAGE, Duration::from_millis(500)).unwrap()
    }

    #[test]
    fn test_code_capture_paths() {
        let storage = StorageAdapter::in_memory();
        let mut editor = open(&storage);
        let t0 = Instant::now();

        editor.observe("x = 1", t0);
        assert!(!editor.poll(t0).unwrap());
        assert!(editor.poll(t0 + Duration::from_millis(600)).unwrap());

        assert!(!editor.capture_for_action("x = 2", "Settings").unwrap());
        assert!(editor.capture_for_action("x = 2", "Run").unwrap());
        assert!(!editor.capture_for_action("x = 2", "Submit").unwrap());

        editor.observe("x = 3", t0);
        assert!(editor.flush().unwrap());

        let history = open(&storage).history().unwrap();
        let codes: Vec<&str> = history.iter().map(|s| s.code.as_str()).collect();
        assert_eq!(codes, vec!["x = 1", "x = 2", "x = 3"]);
        assert_eq!(history[1].action.as_deref(), Some("run"));
    }

    #[test]
    fn test_seed_sets_current_without_logging() {
        let storage = StorageAdapter::in_memory();
        let mut editor = open(&storage);
        editor.seed("class Solution: pass");
        assert_eq!(editor.current_code(), Some("class Solution: pass"));
        assert!(!editor.flush().unwrap());
        assert!(editor.history().unwrap().is_empty());
    }

    #[test]
    fn test_switch_flushes_to_old_page() {
        let storage = StorageAdapter::in_memory();
        let mut editor = open(&storage);
        editor.observe("left on two-sum", Instant::now());

        assert!(!editor.switch_to(PAGE).unwrap());
        assert!(editor.switch_to("https://x.test/problems/3sum").unwrap());
        assert_eq!(editor.page_url(), "https://x.test/problems/3sum");
        assert!(editor.history().unwrap().is_empty());
        assert!(!editor.has_pending());

        let old = open(&storage).history().unwrap();
        assert_eq!(old.len(), 1);
        assert_eq!(old[0].code, "left on two-sum");
    }
}
