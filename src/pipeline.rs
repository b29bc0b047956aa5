//! One full run: crawl, deduplicate, classify, rank, persist, download,
//! persist again.
//!
//! Every stage after the crawl works on values owned by this function.
//! Adapters only return candidates; nothing else writes to the run state.

use crate::classify;
use crate::config::Config;
use crate::download::{DownloadSummary, download_ranked};
use crate::error::PersistenceError;
use crate::http::Fetcher;
use crate::models::{RankedCandidate, RunMetadata};
use crate::outputs::{json, mapping};
use crate::scheduler::{crawl, plan_targets};
use crate::scoring::rank;
use crate::scrapers::SourceAdapter;
use crate::utils::ensure_writable_dir;
use chrono::Utc;
use itertools::Itertools;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// Counts reported at the end of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub discovered: usize,
    pub duplicates: usize,
    pub discarded: usize,
    /// Candidates per subject, largest bucket first.
    pub by_subject: Vec<(String, usize)>,
    pub downloads: Option<DownloadSummary>,
    pub metadata_path: PathBuf,
    pub mapping_path: PathBuf,
}

impl RunSummary {
    pub fn kept(&self) -> usize {
        self.by_subject.iter().map(|(_, n)| n).sum()
    }
}

/// Run the pipeline to completion.
///
/// # Errors
///
/// Only [`PersistenceError`]: the output directory is unusable or a
/// metadata file could not be written. Fetch, parse and download failures
/// are logged where they happen and never end the run.
#[instrument(level = "info", skip_all, fields(output_dir = %config.output_dir.display()))]
pub async fn run<A: SourceAdapter>(
    config: &Config,
    adapter: &A,
    fetcher: &Fetcher,
) -> Result<RunSummary, PersistenceError> {
    let output_dir = config.output_dir.as_path();
    ensure_writable_dir(output_dir).await?;

    // ---- Crawl ----
    let targets = plan_targets(config);
    info!(targets = targets.len(), "Crawl plan ready");
    let discovered = crawl(adapter, targets, config.crawl.concurrency).await;
    let discovered_count = discovered.len();

    // ---- Dedup + classify ----
    let unique: Vec<_> = discovered
        .into_iter()
        .unique_by(|c| c.dedup_key().to_string())
        .collect();
    let duplicates = discovered_count - unique.len();
    let unique_count = unique.len();

    let relevant: Vec<_> = unique
        .into_iter()
        .filter_map(|c| classify::tag(c, &config.taxonomy))
        .collect();
    let discarded = unique_count - relevant.len();
    info!(
        discovered = discovered_count,
        duplicates,
        discarded,
        relevant = relevant.len(),
        "Classification complete"
    );

    // ---- Rank + first write ----
    let mut ranked = rank(relevant, &config.taxonomy, &config.scoring);
    persist(&ranked, output_dir).await?;

    // ---- Downloads ----
    let downloads = if config.download.enabled {
        let dir = output_dir.join(&config.download.subdir);
        ensure_writable_dir(&dir).await?;
        let summary = download_ranked(fetcher, &mut ranked, config.download.cap, &dir).await;
        Some(summary)
    } else {
        info!("Downloads disabled; skipping");
        None
    };

    let (metadata_path, mapping_path) = persist(&ranked, output_dir).await?;

    let summary = RunSummary {
        discovered: discovered_count,
        duplicates,
        discarded,
        by_subject: subject_counts(&ranked),
        downloads,
        metadata_path,
        mapping_path,
    };
    log_summary(&summary);
    Ok(summary)
}

async fn persist(
    ranked: &[RankedCandidate],
    output_dir: &Path,
) -> Result<(PathBuf, PathBuf), PersistenceError> {
    let metadata = RunMetadata::from_ranked(ranked, Utc::now());
    let metadata_path = json::write_metadata(&metadata, output_dir).await?;
    let mapping_path = mapping::write_mapping(ranked, output_dir).await?;
    Ok((metadata_path, mapping_path))
}

fn subject_counts(ranked: &[RankedCandidate]) -> Vec<(String, usize)> {
    ranked
        .iter()
        .counts_by(|r| r.candidate.subject_key().to_string())
        .into_iter()
        .sorted_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)))
        .collect()
}

fn log_summary(summary: &RunSummary) {
    info!(
        kept = summary.kept(),
        discovered = summary.discovered,
        duplicates = summary.duplicates,
        discarded = summary.discarded,
        metadata = %summary.metadata_path.display(),
        "Run summary"
    );
    for (subject, count) in &summary.by_subject {
        info!(subject = %subject, count, "Candidates per subject");
    }
    match &summary.downloads {
        Some(d) if d.saved == 0 && d.attempted > 0 => warn!(
            attempted = d.attempted,
            failed = d.failed,
            "No downloads succeeded"
        ),
        Some(d) => info!(
            saved = d.saved,
            failed = d.failed,
            skipped_without_url = d.skipped_without_url,
            "Download totals"
        ),
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceFamily;
    use crate::models::{Candidate, UNIDENTIFIED_SUBJECT};
    use crate::outputs::json::METADATA_FILE;
    use crate::outputs::mapping::MAPPING_FILE;
    use crate::scrapers::editorial::parse_page;
    use crate::scrapers::{CrawlTarget, WebAdapter};
    use crate::test_support::serve;
    use axum::Router;
    use axum::http::header;
    use axum::routing::get;
    use url::Url;

    const LISTICLE: &str = r#"
        <html><body>
          <figure>
            <img src="https://cdn.example.org/stills/goodfellas-still.jpg" alt="spaghetti dinner scene">
            <figcaption>Goodfellas (1990)</figcaption>
          </figure>
          <img src="/img/logo.svg" alt="Site logo">
          <img src="https://cdn.example.org/img/banner.jpg" alt="Subscribe to our newsletter">
        </body></html>"#;

    /// Serves [`LISTICLE`] for every editorial target, offline.
    struct StaticPageAdapter;

    impl SourceAdapter for StaticPageAdapter {
        async fn fetch(&self, target: &CrawlTarget) -> Vec<Candidate> {
            match target {
                CrawlTarget::Editorial { page_url } => parse_page(LISTICLE, &Url::parse(page_url).unwrap()),
                _ => Vec::new(),
            }
        }
    }

    fn offline_config(output_dir: &Path, pages: &[&str]) -> Config {
        let mut config = Config::default();
        config.output_dir = output_dir.to_path_buf();
        config.sources.enabled = vec![SourceFamily::Editorial];
        config.sources.editorial_pages = pages.iter().map(|p| p.to_string()).collect();
        config.download.enabled = false;
        config
    }

    fn read_metadata(dir: &Path) -> RunMetadata {
        serde_json::from_str(&std::fs::read_to_string(dir.join(METADATA_FILE)).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_single_relevant_image_survives() {
        let dir = tempfile::tempdir().unwrap();
        let config = offline_config(dir.path(), &["https://news.example.org/food-movies"]);
        let fetcher = Fetcher::new(&config.crawl).unwrap();

        let summary = run(&config, &StaticPageAdapter, &fetcher).await.unwrap();
        assert_eq!(summary.discovered, 2);
        assert_eq!(summary.discarded, 1);
        assert_eq!(summary.by_subject, vec![("Goodfellas".to_string(), 1)]);
        assert!(summary.downloads.is_none());

        let meta = read_metadata(dir.path());
        assert_eq!(meta.total_images, 1);
        let only = &meta.images[0];
        assert_eq!(only.candidate.subject_match.as_deref(), Some("Goodfellas"));
        assert!(only.candidate.is_subject_related);
        assert!(only.candidate.is_content_related);
        assert!(only.quality_score() >= 20.0);
        assert!(!meta.by_subject.contains_key(UNIDENTIFIED_SUBJECT));
        assert!(dir.path().join(MAPPING_FILE).is_file());
    }

    #[tokio::test]
    async fn test_repeated_images_are_kept_once() {
        let dir = tempfile::tempdir().unwrap();
        let config = offline_config(
            dir.path(),
            &["https://news.example.org/a", "https://news.example.org/b"],
        );
        let fetcher = Fetcher::new(&config.crawl).unwrap();

        let summary = run(&config, &StaticPageAdapter, &fetcher).await.unwrap();
        assert_eq!(summary.discovered, 4);
        assert_eq!(summary.duplicates, 2);
        assert_eq!(summary.kept(), 1);

        let meta = read_metadata(dir.path());
        assert_eq!(meta.images[0].candidate.source_url, "https://news.example.org/a");
    }

    #[tokio::test]
    async fn test_unusable_output_dir_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("occupied");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let config = offline_config(&blocker, &["https://news.example.org/a"]);
        let fetcher = Fetcher::new(&config.crawl).unwrap();

        let err = run(&config, &StaticPageAdapter, &fetcher).await.unwrap_err();
        assert!(matches!(err, PersistenceError::CreateDir { .. }));
    }

    #[tokio::test]
    async fn test_full_run_against_local_site() {
        let page = r#"
            <html><body>
              <figure>
                <img src="/img/goodfellas-still.jpg" alt="Prison dinner">
                <figcaption>Goodfellas</figcaption>
              </figure>
              <div class="card">
                <img src="/img/missing.png" alt="Big Night timpano">
              </div>
            </body></html>"#;
        let app = Router::new()
            .route("/list", get(move || async move { ([(header::CONTENT_TYPE, "text/html")], page) }))
            .route(
                "/img/goodfellas-still.jpg",
                get(|| async { ([(header::CONTENT_TYPE, "image/jpeg")], vec![0xFFu8, 0xD8, 0xFF]) }),
            );
        let base = serve(app).await;

        let dir = tempfile::tempdir().unwrap();
        let mut config = offline_config(dir.path(), &[base.join("list").unwrap().as_str()]);
        config.download.enabled = true;
        config.crawl.delays_ms.editorial = 0;
        config.crawl.delays_ms.download = 0;
        let fetcher = Fetcher::new(&config.crawl).unwrap();
        let adapter = WebAdapter::new(&fetcher, &config.sources);

        let summary = run(&config, &adapter, &fetcher).await.unwrap();
        assert_eq!(summary.kept(), 2);
        let downloads = summary.downloads.unwrap();
        assert_eq!((downloads.attempted, downloads.saved, downloads.failed), (2, 1, 1));

        let meta = read_metadata(dir.path());
        assert_eq!(meta.total_images, 2);
        assert!(meta.images.iter().all(|r| r.download().is_some()));

        let goodfellas = &meta.by_subject["Goodfellas"][0];
        let saved = dir.path().join("downloaded").join(format!(
            "goodfellas-{}.jpg",
            goodfellas.candidate.identifier
        ));
        assert!(goodfellas.candidate.identifier.starts_with("goodfellas-still-"));
        assert_eq!(std::fs::read(&saved).unwrap(), vec![0xFF, 0xD8, 0xFF]);

        let mapping: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&summary.mapping_path).unwrap()).unwrap();
        assert_eq!(
            mapping["Goodfellas"][0]["local_path"],
            saved.display().to_string().as_str()
        );
        assert!(mapping["Big Night"][0].get("local_path").is_none());
    }
}
