pub mod code_history;
pub mod page_scraper;
pub mod page_source;
pub mod page_watch;
pub mod storage;

pub use page_scraper::PageScraper;
pub use storage::{StorageAdapter, Tier};
