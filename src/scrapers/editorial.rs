//! Editorial article scraper.
//!
//! Food-in-film listicles put their stills in ordinary `<img>` tags, often
//! lazily loaded through `data-src` and usually inside a `<figure>` with a
//! caption naming the film. Each image becomes one candidate carrying its
//! alt text and resolved caption.

use crate::caption::resolve_caption;
use crate::config::RequestKind;
use crate::http::Fetcher;
use crate::models::{Candidate, Provenance};
use crate::scrapers::has_image_extension;
use crate::utils::truncate_for_log;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

static IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("img").expect("static selector"));

/// Fetch one editorial page and extract its image candidates.
#[instrument(level = "info", skip(fetcher))]
pub async fn fetch(fetcher: &Fetcher, page_url: &str) -> Vec<Candidate> {
    let url = match Url::parse(page_url) {
        Ok(url) => url,
        Err(e) => {
            warn!(error = %e, "Skipping editorial page with unusable URL");
            return Vec::new();
        }
    };

    let html = match fetcher.get_text(&url, RequestKind::Editorial).await {
        Ok(html) => html,
        Err(e) => {
            error!(error = %e, "Editorial fetch failed");
            return Vec::new();
        }
    };

    let candidates = parse_page(&html, &url);
    info!(count = candidates.len(), "Parsed editorial page");
    candidates
}

/// Extract image candidates from an editorial page.
///
/// # Arguments
///
/// * `html` - The page body
/// * `page_url` - Base for relative and protocol-relative references
///
/// # Returns
///
/// One unclassified candidate per `<img>` whose resolved URL has an image
/// suffix, with its alt text and caption, in document order.
pub fn parse_page(html: &str, page_url: &Url) -> Vec<Candidate> {
    let document = Html::parse_document(html);
    let mut candidates = Vec::new();

    for img in document.select(&IMG) {
        let attrs = img.value();
        let Some(src) = attrs
            .attr("src")
            .map(str::trim)
            .filter(|s| !s.is_empty() && !s.starts_with("data:"))
            .or_else(|| attrs.attr("data-src").map(str::trim).filter(|s| !s.is_empty()))
        else {
            continue;
        };

        let resolved = match page_url.join(src) {
            Ok(url) => url,
            Err(e) => {
                debug!(src, error = %e, "Unresolvable image reference");
                continue;
            }
        };
        if !has_image_extension(resolved.as_str()) {
            continue;
        }

        let caption = resolve_caption(img);
        let candidate = Candidate::new(
            Provenance::Editorial {
                page_url: page_url.to_string(),
            },
            page_url.as_str(),
            Some(resolved),
        )
        .with_alt_text(attrs.attr("alt"))
        .with_caption(caption.as_deref());

        debug!(
            image = candidate.image_url.as_deref().unwrap_or_default(),
            alt = %truncate_for_log(candidate.alt_text.as_deref().unwrap_or_default(), 50),
            "Found editorial image"
        );
        candidates.push(candidate);
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <img src="/static/logo.svg" alt="logo">
          <figure>
            <img data-src="//cdn.example.com/stills/goodfellas.jpg" alt="Prison dinner">
            <figcaption>Goodfellas (1990)</figcaption>
          </figure>
          <p><img src="images/big-night-timpano.PNG" title="Big Night"></p>
          <img src="data:image/gif;base64,R0lGOD" data-src="https://cdn.example.com/lazy.webp">
          <img alt="no source at all">
        </body></html>"#;

    #[test]
    fn test_parse_page_resolves_and_filters() {
        let base = Url::parse("https://www.example.com/guide/food-scenes/").unwrap();
        let found = parse_page(PAGE, &base);
        let urls: Vec<_> = found.iter().map(|c| c.image_url.clone().unwrap()).collect();

        assert_eq!(
            urls,
            vec![
                "https://cdn.example.com/stills/goodfellas.jpg",
                "https://www.example.com/guide/food-scenes/images/big-night-timpano.PNG",
                "https://cdn.example.com/lazy.webp",
            ]
        );
        assert_eq!(found[0].alt_text.as_deref(), Some("Prison dinner"));
        assert_eq!(found[0].caption.as_deref(), Some("Goodfellas (1990)"));
        assert_eq!(found[1].caption.as_deref(), Some("Big Night"));
        assert_eq!(found[1].identifier, "big-night-timpano-c1d03afe");
        assert!(found.iter().all(|c| c.source_url == base.as_str()));
    }

    #[test]
    fn test_parse_page_without_images() {
        let base = Url::parse("https://www.example.com/").unwrap();
        assert!(parse_page("<p>No pictures here</p>", &base).is_empty());
    }
}
