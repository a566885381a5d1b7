//! Where the host page's HTML comes from.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

/// A page that can be re-read to pick up content rendered after load.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// URL used to partition history for this page.
    fn page_url(&self) -> &str;

    /// Current HTML of the page.
    async fn snapshot(&self) -> Result<String>;
}

/// A live page fetched over HTTP(S).
pub struct HttpPageSource {
    client: reqwest::Client,
    url: String,
}

impl HttpPageSource {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("Mozilla/5.0 (compatible; ProblemSolver/1.0)")
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    fn page_url(&self) -> &str {
        &self.url
    }

    async fn snapshot(&self) -> Result<String> {
        let response = self.client.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!("HTTP error: {}", response.status()));
        }
        Ok(response.text().await?)
    }
}

/// A page saved to disk; re-read on every snapshot so edits show up.
pub struct FilePageSource {
    path: PathBuf,
    url: String,
}

impl FilePageSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let absolute = path.canonicalize().unwrap_or_else(|_| path.clone());
        let url = format!("file://{}", absolute.display());
        Self { path, url }
    }
}

#[async_trait]
impl PageSource for FilePageSource {
    fn page_url(&self) -> &str {
        &self.url
    }

    async fn snapshot(&self) -> Result<String> {
        tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading {}", self.path.display()))
    }
}

/// Pick a source for a command-line argument: URLs are fetched, anything else is a file path.
pub fn source_for(location: &str) -> Result<Box<dyn PageSource>> {
    match url::Url::parse(location) {
        Ok(parsed) if parsed.scheme() == "http" || parsed.scheme() == "https" => {
            Ok(Box::new(HttpPageSource::new(location)?))
        }
        Ok(parsed) if parsed.scheme() == "file" => {
            let path = parsed
                .to_file_path()
                .map_err(|_| anyhow!("Not a local file URL: {}", location))?;
            Ok(Box::new(FilePageSource::new(path)))
        }
        _ => Ok(Box::new(FilePageSource::new(location))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_source_rereads_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("problem.html");
        std::fs::write(&path, "<h1>v1</h1>").unwrap();

        let source = FilePageSource::new(&path);
        assert!(source.page_url().starts_with("file://"));
        assert_eq!(source.snapshot().await.unwrap(), "<h1>v1</h1>");

        std::fs::write(&path, "<h1>v2</h1>").unwrap();
        assert_eq!(source.snapshot().await.unwrap(), "<h1>v2</h1>");
    }

    #[test]
    fn test_source_for_picks_by_scheme() {
        let http = source_for("https://example.com/problems/two-sum").unwrap();
        assert_eq!(http.page_url(), "https://example.com/problems/two-sum");

        let file = source_for("saved/problem.html").unwrap();
        assert!(file.page_url().starts_with("file://"));
        assert!(file.page_url().ends_with("problem.html"));
    }
}
