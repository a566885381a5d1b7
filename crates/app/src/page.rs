//! Loading the host page the assistant is attached to.

use anyhow::{Context, Result};
use services::page_source::source_for;
use services::PageScraper;
use shared::ProblemContext;
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use tracing::info;

/// One read of the host page plus what was scraped from it.
#[derive(Debug, Clone, Default)]
pub struct LoadedPage {
    /// What the user asked for: a URL or a file path.
    pub location: String,
    /// Key for this page's history.
    pub url: String,
    pub html: String,
    pub problem: ProblemContext,
    pub editor_code: Option<String>,
}

impl LoadedPage {
    pub fn from_html(location: &str, url: &str, html: String, scraper: &PageScraper) -> Self {
        let problem = scraper.extract_problem_context(&html, url);
        let editor_code = scraper.editor_code(&html);
        Self {
            location: location.to_string(),
            url: url.to_string(),
            html,
            problem,
            editor_code,
        }
    }

    /// Whether the scrape already found a usable statement.
    pub fn is_complete(&self, scraper: &PageScraper) -> bool {
        self.problem
            .has_description(scraper.config().min_description_len)
    }
}

/// Fetch and scrape `location`, blocking the calling thread.
pub fn load_page(location: &str, scraper: &PageScraper) -> Result<LoadedPage> {
    let runtime = tokio::runtime::Runtime::new().context("starting page loader runtime")?;
    let source = source_for(location)?;
    let html = runtime
        .block_on(source.snapshot())
        .with_context(|| format!("loading {}", location))?;
    info!("Loaded {} ({} bytes)", source.page_url(), html.len());
    Ok(LoadedPage::from_html(
        location,
        source.page_url(),
        html,
        scraper,
    ))
}

/// [`load_page`] on a background thread; the result arrives on the receiver.
pub fn load_page_in_background(
    location: String,
    scraper: Arc<PageScraper>,
) -> Receiver<Result<LoadedPage, String>> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let result = load_page(&location, &scraper).map_err(|e| format!("{:#}", e));
        let _ = tx.send(result);
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::settings::ScrapeSettings;

    #[test]
    fn test_load_page_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("two-sum.html");
        let statement = "Given an array of integers nums and an integer target, return indices of the two numbers such that they add up to target.";
        std::fs::write(
            &path,
            format!(
                r#"<html><body><h1>1. Two Sum</h1>
                <div class="question-content">{}</div>
                <div class="monaco-editor">class Solution: pass</div></body></html>"#,
                statement
            ),
        )
        .unwrap();

        let scraper = PageScraper::new(ScrapeSettings::default());
        let page = load_page(path.to_str().unwrap(), &scraper).unwrap();
        assert!(page.url.starts_with("file://"));
        assert_eq!(page.problem.title, "1. Two Sum");
        assert!(page.is_complete(&scraper));
        assert_eq!(page.editor_code.as_deref(), Some("class Solution: pass"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let scraper = PageScraper::new(ScrapeSettings::default());
        let rx = load_page_in_background("/definitely/not/here.html".into(), Arc::new(scraper));
        assert!(rx.recv().unwrap().is_err());
    }
}
