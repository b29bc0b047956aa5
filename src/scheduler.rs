//! Crawl planning and bounded-concurrency execution.
//!
//! Every (source, subject) or (subreddit, query) pair is an independent
//! [`CrawlTarget`]. Up to `concurrency` targets run at once; pacing between
//! requests to the same host is enforced underneath by the fetcher's host
//! pacer, so concurrency only ever overlaps requests to different hosts.
//!
//! Results come back through an ordered stream and are appended by this
//! function alone, so the candidate list is in plan order regardless of
//! which target finished first.

use crate::config::{Config, SourceFamily};
use crate::models::Candidate;
use crate::scrapers::{CrawlTarget, SourceAdapter};
use futures::stream::{self, StreamExt};
use tracing::{info, instrument};

/// Build the full crawl plan in order: editorial pages, stills searches,
/// then Reddit searches.
pub fn plan_targets(config: &Config) -> Vec<CrawlTarget> {
    let sources = &config.sources;
    let subjects: Vec<&str> = config.taxonomy.subject_names().collect();
    let mut targets = Vec::new();

    if sources.is_enabled(SourceFamily::Editorial) {
        targets.extend(
            sources
                .editorial_pages
                .iter()
                .map(|page| CrawlTarget::Editorial {
                    page_url: page.clone(),
                }),
        );
    }

    if sources.is_enabled(SourceFamily::StillsDb) {
        targets.extend(subjects.iter().map(|subject| CrawlTarget::StillsDb {
            subject: subject.to_string(),
        }));
    }

    if sources.is_enabled(SourceFamily::Reddit) {
        for subreddit in &sources.subreddits {
            let reddit = |query: String| CrawlTarget::Reddit {
                subreddit: subreddit.clone(),
                query,
            };
            targets.extend(sources.reddit_queries.iter().cloned().map(reddit));
            targets.extend(subjects.iter().map(|s| reddit(s.to_string())));
            if sources.subject_query_subreddits.contains(subreddit) {
                targets.extend(
                    subjects
                        .iter()
                        .take(sources.subject_query_limit)
                        .map(|s| reddit(format!("{s} food"))),
                );
            }
        }
    }

    targets
}

/// Run every target through `adapter`, at most `concurrency` at a time,
/// returning all candidates in plan order.
#[instrument(level = "info", skip_all, fields(targets = targets.len(), concurrency = concurrency))]
pub async fn crawl<A: SourceAdapter>(
    adapter: &A,
    targets: Vec<CrawlTarget>,
    concurrency: usize,
) -> Vec<Candidate> {
    let total = targets.len();
    let mut results = stream::iter(targets.into_iter().enumerate())
        .map(|(i, target)| async move {
            info!(step = i + 1, of = total, family = ?target.family(), target = %target, "Crawling");
            let found = adapter.fetch(&target).await;
            (target, found)
        })
        .buffered(concurrency.max(1));

    let mut candidates = Vec::new();
    let mut empty_targets = 0usize;
    while let Some((target, found)) = results.next().await {
        if found.is_empty() {
            empty_targets += 1;
        }
        candidates.extend(found);
        info!(target = %target, running_total = candidates.len(), "Target complete");
    }

    info!(
        candidates = candidates.len(),
        targets = total,
        empty_targets,
        "Crawl finished"
    );
    candidates
}
