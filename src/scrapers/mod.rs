//! Source adapters that turn one crawl target into raw candidates.
//!
//! | Family | Module | Method | Notes |
//! |--------|--------|--------|-------|
//! | Editorial articles | [`editorial`] | HTML scraping | Every `<img>` with an image suffix, plus caption text |
//! | Stills database | [`stillsdb`] | HTML scraping, two hops | Search page, then up to N result pages |
//! | Reddit | [`reddit`] | Search JSON API | One request per (subreddit, query) |
//!
//! Adapters never fail: a request or parse error is logged and the target
//! contributes whatever was decoded before the error, possibly nothing.
//! Candidates leave an adapter unclassified; see [`crate::classify::tag`].

pub mod editorial;
pub mod reddit;
pub mod stillsdb;

use crate::config::{SourceFamily, SourcesConfig};
use crate::http::Fetcher;
use crate::models::Candidate;
use std::fmt;

/// Suffixes that mark a URL as pointing at raw image bytes.
pub const IMAGE_EXTENSIONS: [&str; 5] = [".jpg", ".jpeg", ".png", ".webp", ".gif"];

/// True if `url` contains one of [`IMAGE_EXTENSIONS`], ignoring case.
pub fn has_image_extension(url: &str) -> bool {
    let lower = url.to_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| lower.contains(ext))
}

/// One independent unit of crawl work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlTarget {
    Editorial { page_url: String },
    StillsDb { subject: String },
    Reddit { subreddit: String, query: String },
}

impl CrawlTarget {
    pub fn family(&self) -> SourceFamily {
        match self {
            CrawlTarget::Editorial { .. } => SourceFamily::Editorial,
            CrawlTarget::StillsDb { .. } => SourceFamily::StillsDb,
            CrawlTarget::Reddit { .. } => SourceFamily::Reddit,
        }
    }
}

impl fmt::Display for CrawlTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrawlTarget::Editorial { page_url } => write!(f, "{page_url}"),
            CrawlTarget::StillsDb { subject } => write!(f, "stills-db:{subject}"),
            CrawlTarget::Reddit { subreddit, query } => write!(f, "r/{subreddit} q={query:?}"),
        }
    }
}

/// Fetches one target and normalizes whatever it finds into candidates.
pub trait SourceAdapter {
    async fn fetch(&self, target: &CrawlTarget) -> Vec<Candidate>;
}

/// The live adapter: dispatches each target to its family's scraper.
#[derive(Debug)]
pub struct WebAdapter<'a> {
    fetcher: &'a Fetcher,
    sources: &'a SourcesConfig,
}

impl<'a> WebAdapter<'a> {
    pub fn new(fetcher: &'a Fetcher, sources: &'a SourcesConfig) -> Self {
        Self { fetcher, sources }
    }
}

impl SourceAdapter for WebAdapter<'_> {
    async fn fetch(&self, target: &CrawlTarget) -> Vec<Candidate> {
        match target {
            CrawlTarget::Editorial { page_url } => editorial::fetch(self.fetcher, page_url).await,
            CrawlTarget::StillsDb { subject } => {
                stillsdb::fetch(self.fetcher, self.sources, subject).await
            }
            CrawlTarget::Reddit { subreddit, query } => {
                reddit::fetch(self.fetcher, self.sources, subreddit, query).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_image_extension() {
        assert!(has_image_extension("https://x.com/a/B.JPG"));
        assert!(has_image_extension("https://x.com/a.webp?w=200"));
        assert!(!has_image_extension("https://x.com/pixel.svg"));
    }

    #[test]
    fn test_target_display() {
        let t = CrawlTarget::Reddit {
            subreddit: "movies".into(),
            query: "Chef food".into(),
        };
        assert_eq!(t.to_string(), "r/movies q=\"Chef food\"");
        assert_eq!(t.family(), SourceFamily::Reddit);
    }
}
