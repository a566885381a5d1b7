//! Bounded wait for a page's problem statement to finish rendering.
//!
//! Single-page apps often serve a shell first and fill the statement in later.
//! The watch re-reads the page on an interval until the scraper finds a
//! description, the deadline passes, or the caller aborts it.

use crate::page_scraper::PageScraper;
use crate::page_source::PageSource;
use futures::future::{AbortHandle, AbortRegistration, Abortable};
use shared::settings::WatchSettings;
use shared::ProblemContext;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOutcome {
    /// A description long enough to use was found.
    Found(ProblemContext),
    /// The deadline passed; carries the last (incomplete) scrape, if any.
    TimedOut(Option<ProblemContext>),
    Cancelled,
}

#[derive(Debug, Clone, Copy)]
pub struct WatchConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl From<&WatchSettings> for WatchConfig {
    fn from(settings: &WatchSettings) -> Self {
        Self {
            interval: Duration::from_millis(settings.poll_interval_ms),
            timeout: Duration::from_millis(settings.timeout_ms),
        }
    }
}

/// Handle for cancelling a running [`watch_for_content`].
pub struct ContentWatch {
    handle: AbortHandle,
}

impl ContentWatch {
    pub fn new() -> (Self, AbortRegistration) {
        let (handle, registration) = AbortHandle::new_pair();
        (Self { handle }, registration)
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_cancelled(&self) -> bool {
        self.handle.is_aborted()
    }
}

/// Poll `source` until a description appears, bounded by `config.timeout`.
pub async fn watch_for_content(
    source: &dyn PageSource,
    scraper: &PageScraper,
    config: WatchConfig,
    registration: AbortRegistration,
) -> WatchOutcome {
    let poll = Abortable::new(
        tokio::time::timeout(config.timeout, poll_until_found(source, scraper, config.interval)),
        registration,
    );

    match poll.await {
        Ok(Ok(ctx)) => {
            info!("Problem details extracted from {}", ctx.url);
            WatchOutcome::Found(ctx)
        }
        Ok(Err(_elapsed)) => {
            info!("Content watch timed out after {:?}", config.timeout);
            let last = match source.snapshot().await {
                Ok(html) => Some(scraper.extract_problem_context(&html, source.page_url())),
                Err(_) => None,
            };
            WatchOutcome::TimedOut(last)
        }
        Err(_aborted) => {
            debug!("Content watch cancelled");
            WatchOutcome::Cancelled
        }
    }
}

async fn poll_until_found(
    source: &dyn PageSource,
    scraper: &PageScraper,
    interval: Duration,
) -> ProblemContext {
    let min_len = scraper.config().min_description_len;
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let html = match source.snapshot().await {
            Ok(html) => html,
            Err(e) => {
                warn!("Could not read page: {:#}", e);
                continue;
            }
        };
        if !scraper.has_content_markers(&html) {
            continue;
        }
        let ctx = scraper.extract_problem_context(&html, source.page_url());
        if ctx.has_description(min_len) {
            return ctx;
        }
        debug!("Problem details extraction incomplete, waiting...");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves queued pages in order, then repeats the last one.
    struct ScriptedPage {
        pages: Mutex<VecDeque<String>>,
        reads: AtomicUsize,
    }

    impl ScriptedPage {
        fn new(pages: &[&str]) -> Self {
            Self {
                pages: Mutex::new(pages.iter().map(|p| p.to_string()).collect()),
                reads: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PageSource for ScriptedPage {
        fn page_url(&self) -> &str {
            "https://x.test/p"
        }

        async fn snapshot(&self) -> Result<String> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            let mut pages = self.pages.lock();
            if pages.len() > 1 {
                Ok(pages.pop_front().unwrap_or_default())
            } else {
                Ok(pages.front().cloned().unwrap_or_default())
            }
        }
    }

    fn fast() -> WatchConfig {
        WatchConfig {
            interval: Duration::from_millis(5),
            timeout: Duration::from_millis(300),
        }
    }

    #[tokio::test]
    async fn test_finds_content_rendered_later() {
        let statement = "Given an array of integers, return indices of the two numbers such that they add up to a specific target value.";
        let loaded = format!(
            r#"<body><h1>Two Sum</h1><div class="problem-statement">{}</div></body>"#,
            statement
        );
        let page = ScriptedPage::new(&["<body>loading</body>", "<body>loading</body>", &loaded]);
        let (_watch, reg) = ContentWatch::new();

        let outcome = watch_for_content(&page, &PageScraper::default(), fast(), reg).await;
        match outcome {
            WatchOutcome::Found(ctx) => {
                assert_eq!(ctx.title, "Two Sum");
                assert_eq!(ctx.description, statement);
            }
            other => panic!("expected Found, got {:?}", other),
        }
        assert!(page.reads.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn test_times_out_with_last_scrape() {
        let page = ScriptedPage::new(&["<body><h1>Shell</h1></body>"]);
        let (_watch, reg) = ContentWatch::new();

        let outcome = watch_for_content(&page, &PageScraper::default(), fast(), reg).await;
        match outcome {
            WatchOutcome::TimedOut(Some(ctx)) => {
                assert_eq!(ctx.title, "Shell");
                assert!(ctx.description.is_empty());
            }
            other => panic!("expected TimedOut, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancel_stops_watch() {
        let page = ScriptedPage::new(&["<body></body>"]);
        let (watch, reg) = ContentWatch::new();
        watch.cancel();
        assert!(watch.is_cancelled());

        let config = WatchConfig {
            interval: Duration::from_millis(5),
            timeout: Duration::from_secs(30),
        };
        let outcome = watch_for_content(&page, &PageScraper::default(), config, reg).await;
        assert_eq!(outcome, WatchOutcome::Cancelled);
    }
}
