//! Movie stills database scraper.
//!
//! Two hops per subject: the site search page lists matching films, and
//! each film page carries the stills. Only the first few results are
//! followed, and each hop waits on the host pacer like any other request.

use crate::config::{RequestKind, SourcesConfig};
use crate::http::Fetcher;
use crate::models::{Candidate, Provenance};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("static selector"));
static IMG_WITH_CLASS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("img[class]").expect("static selector"));

/// Search the stills database for `subject` and collect stills from the
/// top results.
#[instrument(level = "info", skip(fetcher, sources))]
pub async fn fetch(fetcher: &Fetcher, sources: &SourcesConfig, subject: &str) -> Vec<Candidate> {
    let search = match search_url(&sources.stills_base_url, subject) {
        Ok(url) => url,
        Err(e) => {
            warn!(error = %e, base = %sources.stills_base_url, "Cannot build stills search URL");
            return Vec::new();
        }
    };

    let html = match fetcher.get_text(&search, RequestKind::StillsDb).await {
        Ok(html) => html,
        Err(e) => {
            error!(error = %e, "Stills search failed");
            return Vec::new();
        }
    };

    let results = result_links(&html, &search, sources.stills_max_results);
    debug!(results = results.len(), "Stills search results");

    let mut candidates = Vec::new();
    for detail_url in results {
        match fetcher.get_text(&detail_url, RequestKind::StillsDb).await {
            Ok(page) => candidates.extend(parse_detail(&page, &detail_url, subject)),
            Err(e) => warn!(error = %e, url = %detail_url, "Stills detail fetch failed"),
        }
    }

    info!(count = candidates.len(), "Collected stills");
    candidates
}

/// `{base}/movies/search/{subject}` with the subject percent-encoded.
pub fn search_url(base: &str, subject: &str) -> Result<Url, url::ParseError> {
    let base = Url::parse(&format!("{}/", base.trim_end_matches('/')))?;
    base.join(&format!("movies/search/{}", urlencoding::encode(subject)))
}

/// Film pages linked from a search page, first `limit`, without repeats.
pub fn result_links(html: &str, search_url: &Url, limit: usize) -> Vec<Url> {
    let document = Html::parse_document(html);
    let mut links: Vec<Url> = Vec::new();
    for anchor in document.select(&LINK) {
        if links.len() >= limit {
            break;
        }
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if !href.contains("/movies/") || href.contains("/movies/search") {
            continue;
        }
        if let Ok(url) = search_url.join(href) {
            if !links.contains(&url) {
                links.push(url);
            }
        }
    }
    links
}

/// Stills on a film page: images whose class mentions `still`, upgraded
/// from thumbnail to full size.
///
/// # Arguments
///
/// * `html` - The film page body
/// * `detail_url` - The film page URL, used to resolve image references
/// * `subject` - The subject searched for, kept in the provenance
///
/// # Returns
///
/// One candidate per still, in document order.
pub fn parse_detail(html: &str, detail_url: &Url, subject: &str) -> Vec<Candidate> {
    let document = Html::parse_document(html);
    document
        .select(&IMG_WITH_CLASS)
        .filter(|img| img.value().attr("class").is_some_and(|c| c.contains("still")))
        .filter_map(|img| {
            let src = img
                .value()
                .attr("src")
                .or_else(|| img.value().attr("data-src"))
                .map(str::trim)
                .filter(|s| !s.is_empty())?;
            let full = src.replace("thumb", "full");
            let image_url = detail_url.join(&full).ok()?;
            Some(
                Candidate::new(
                    Provenance::StillsDb {
                        subject: subject.to_string(),
                        detail_url: detail_url.to_string(),
                    },
                    detail_url.as_str(),
                    Some(image_url),
                )
                .with_alt_text(img.value().attr("alt")),
            )
        })
        .collect()
}
