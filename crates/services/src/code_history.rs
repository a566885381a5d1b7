//! Editor change tracking: debounced capture plus a per-page snapshot log.

use crate::storage::{StorageAdapter, CODE_HISTORY_KEY};
use anyhow::Result;
use shared::{CodeSnapshot, PagePartitioned};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Controls whose label means "the user is about to run their code".
const RUN_ACTION_WORDS: &[&str] = &["test", "submit", "run"];

/// Lower-cased action label if `label` names a run/test/submit control.
pub fn run_action(label: &str) -> Option<String> {
    let lower = label.trim().to_lowercase();
    if RUN_ACTION_WORDS.iter().any(|w| lower.contains(w)) {
        Some(lower)
    } else {
        None
    }
}

struct PendingEdit {
    code: String,
    source_label: String,
    due: Instant,
}

/// Turns a stream of editor edits into snapshots.
///
/// Edits are held until the editor has been quiet for the debounce window;
/// a run/test/submit action captures immediately. Either way a snapshot is
/// only produced when the code differs from the last one captured.
pub struct CodeTracker {
    page_url: String,
    debounce: Duration,
    last_captured: Option<String>,
    current: Option<String>,
    pending: Option<PendingEdit>,
}

impl CodeTracker {
    pub fn new(page_url: impl Into<String>, debounce: Duration) -> Self {
        Self {
            page_url: page_url.into(),
            debounce,
            last_captured: None,
            current: None,
            pending: None,
        }
    }

    /// Resume after `history` so an unchanged editor doesn't log a duplicate.
    pub fn resume(mut self, history: &[CodeSnapshot]) -> Self {
        self.last_captured = history
            .iter()
            .rev()
            .find(|s| s.page_url() == self.page_url)
            .map(|s| s.code.clone());
        self
    }

    pub fn page_url(&self) -> &str {
        &self.page_url
    }

    /// Latest editor text seen, captured or not.
    pub fn current_code(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Note what the editor holds without logging it, e.g. the page's starter code.
    pub fn seed(&mut self, code: &str) {
        self.current = Some(code.to_string());
    }

    /// Record an edit; restarts the quiet-period timer.
    pub fn observe_edit(&mut self, code: &str, source_label: &str, now: Instant) {
        self.current = Some(code.to_string());
        self.pending = Some(PendingEdit {
            code: code.to_string(),
            source_label: source_label.to_string(),
            due: now + self.debounce,
        });
    }

    /// Snapshot for a pending edit whose quiet period has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<CodeSnapshot> {
        let due = self.pending.as_ref().map(|p| p.due)?;
        if now < due {
            return None;
        }
        let pending = self.pending.take()?;
        self.capture(pending.code, &pending.source_label, None)
    }

    /// Capture immediately, e.g. when the user presses Run.
    pub fn capture_now(
        &mut self,
        code: &str,
        source_label: &str,
        action: Option<String>,
    ) -> Option<CodeSnapshot> {
        self.current = Some(code.to_string());
        self.pending = None;
        self.capture(code.to_string(), source_label, action)
    }

    /// Flush whatever is pending regardless of the timer; used on teardown.
    pub fn flush(&mut self) -> Option<CodeSnapshot> {
        let pending = self.pending.take()?;
        self.capture(pending.code, &pending.source_label, None)
    }

    fn capture(
        &mut self,
        code: String,
        source_label: &str,
        action: Option<String>,
    ) -> Option<CodeSnapshot> {
        if self.last_captured.as_deref() == Some(code.as_str()) {
            return None;
        }
        self.last_captured = Some(code.clone());
        let snapshot = CodeSnapshot::new(code, source_label, self.page_url.clone());
        Some(match action {
            Some(action) => snapshot.with_action(action),
            None => snapshot,
        })
    }
}

/// Every page's snapshots, read through the fast tier.
pub fn load_code_history(storage: &StorageAdapter) -> Result<Vec<CodeSnapshot>> {
    Ok(storage
        .get_cached::<Vec<CodeSnapshot>>(CODE_HISTORY_KEY)?
        .unwrap_or_default())
}

/// Append `snapshot` to both tiers unless it repeats the page's latest code.
///
/// Returns whether anything was written.
pub fn append_snapshot(storage: &StorageAdapter, snapshot: CodeSnapshot) -> Result<bool> {
    let mut history = load_code_history(storage)?;
    let duplicate = history
        .iter()
        .rev()
        .find(|s| s.page_url() == snapshot.page_url())
        .map_or(false, |last| last.code == snapshot.code);
    if duplicate {
        debug!("Skipping unchanged code snapshot for {}", snapshot.page_url());
        return Ok(false);
    }

    let preview: String = snapshot.code.chars().take(100).collect();
    history.push(snapshot);
    storage.set_through(CODE_HISTORY_KEY, &history)?;
    info!("Code updated: {}...", preview);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Tier;

    const PAGE: &str = "https://x.test/p/1";

    #[test]
    fn test_debounced_edits_collapse_into_one_snapshot() {
        let mut tracker = CodeTracker::new(PAGE, Duration::from_millis(500));
        let t0 = Instant::now();

        tracker.observe_edit("d", "monaco-editor", t0);
        tracker.observe_edit("de", "monaco-editor", t0 + Duration::from_millis(200));
        tracker.observe_edit("def", "monaco-editor", t0 + Duration::from_millis(400));

        assert!(tracker.poll(t0 + Duration::from_millis(800)).is_none());
        let snap = tracker.poll(t0 + Duration::from_millis(900)).unwrap();
        assert_eq!(snap.code, "def");
        assert_eq!(snap.page_url, PAGE);
        assert!(!tracker.has_pending());
    }

    #[test]
    fn test_unchanged_code_not_captured_twice() {
        let mut tracker = CodeTracker::new(PAGE, Duration::from_millis(10));
        assert!(tracker.capture_now("x = 1", "monaco-editor", None).is_some());
        assert!(tracker.capture_now("x = 1", "monaco-editor", None).is_none());

        let t0 = Instant::now();
        tracker.observe_edit("x = 1", "monaco-editor", t0);
        assert!(tracker.poll(t0 + Duration::from_millis(20)).is_none());
    }

    #[test]
    fn test_run_action_forces_capture_with_label() {
        assert_eq!(run_action("Run Code"), Some("run code".to_string()));
        assert_eq!(run_action("Submit"), Some("submit".to_string()));
        assert_eq!(run_action("Settings"), None);

        let mut tracker = CodeTracker::new(PAGE, Duration::from_secs(60));
        tracker.observe_edit("print(2)", "monaco-editor", Instant::now());
        let snap = tracker
            .capture_now("print(2)", "monaco-editor", run_action("Run"))
            .unwrap();
        assert_eq!(snap.action.as_deref(), Some("run"));
        assert!(!tracker.has_pending());
    }

    #[test]
    fn test_resume_uses_latest_snapshot_for_page() {
        let history = vec![
            CodeSnapshot::new("a", "monaco-editor", PAGE),
            CodeSnapshot::new("b", "monaco-editor", "https://x.test/other"),
        ];
        let mut tracker = CodeTracker::new(PAGE, Duration::ZERO).resume(&history);
        assert!(tracker.capture_now("a", "monaco-editor", None).is_none());
        assert!(tracker.capture_now("b", "monaco-editor", None).is_some());
    }

    #[test]
    fn test_append_identical_snapshot_is_noop() {
        let storage = StorageAdapter::in_memory();
        assert!(append_snapshot(&storage, CodeSnapshot::new("v1", "monaco-editor", PAGE)).unwrap());
        assert!(!append_snapshot(&storage, CodeSnapshot::new("v1", "monaco-editor", PAGE)).unwrap());
        assert_eq!(load_code_history(&storage).unwrap().len(), 1);

        // Same code on a different page is a separate partition.
        assert!(append_snapshot(&storage, CodeSnapshot::new("v1", "monaco-editor", "other")).unwrap());
        assert_eq!(load_code_history(&storage).unwrap().len(), 2);

        let durable: Vec<CodeSnapshot> = storage
            .get(Tier::Durable, CODE_HISTORY_KEY)
            .unwrap()
            .unwrap();
        assert_eq!(durable.len(), 2);
    }
}
