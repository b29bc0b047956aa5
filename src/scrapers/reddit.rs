//! Reddit search scraper.
//!
//! Uses the public `search.json` listing endpoint restricted to one
//! subreddit. A post's image can live in several places, checked in order:
//!
//! 1. the post link itself, when it ends in an image suffix
//! 2. an `i.redd.it` link
//! 3. a single-image imgur page, rewritten to its `i.imgur.com` file
//!    (albums and galleries have no single image and resolve to nothing)
//! 4. the largest preview variant Reddit generated for the post
//!
//! URLs in the listing are HTML-escaped (`&amp;`) and are unescaped before
//! use.

use crate::config::{RequestKind, SourcesConfig};
use crate::error::ParseError;
use crate::http::Fetcher;
use crate::models::{Candidate, Provenance};
use crate::scrapers::has_image_extension;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

#[derive(Debug, Default, Deserialize)]
struct Listing {
    #[serde(default)]
    data: ListingData,
}

#[derive(Debug, Default, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: Post,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Post {
    id: String,
    title: String,
    selftext: String,
    url: String,
    permalink: String,
    author: Option<String>,
    ups: i64,
    num_comments: u64,
    created_utc: f64,
    preview: Option<Preview>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Preview {
    images: Vec<PreviewImage>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PreviewImage {
    source: Option<PreviewVariant>,
    resolutions: Vec<PreviewVariant>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
struct PreviewVariant {
    url: String,
    width: u32,
}

/// Where a post's image was found.
#[derive(Debug, Clone, PartialEq)]
enum ImageRef {
    Direct(Url),
    /// An album or gallery: image content exists but has no single URL.
    Album,
    Missing,
}

/// Run one subreddit search and normalize the returned posts.
#[instrument(level = "info", skip(fetcher, sources))]
pub async fn fetch(
    fetcher: &Fetcher,
    sources: &SourcesConfig,
    subreddit: &str,
    query: &str,
) -> Vec<Candidate> {
    let url = match search_url(sources, subreddit, query) {
        Ok(url) => url,
        Err(e) => {
            warn!(error = %e, "Cannot build Reddit search URL");
            return Vec::new();
        }
    };

    let body = match fetcher.get_text(&url, RequestKind::Reddit).await {
        Ok(body) => body,
        Err(e) => {
            error!(error = %e, "Reddit search failed");
            return Vec::new();
        }
    };

    match parse_listing(&body, subreddit, query) {
        Ok(candidates) => {
            info!(count = candidates.len(), "Parsed Reddit search results");
            candidates
        }
        Err(e) => {
            error!(error = %e, "Reddit listing is not valid JSON");
            Vec::new()
        }
    }
}

/// `{base}/r/{subreddit}/search.json` restricted to the subreddit, top posts
/// of all time.
pub fn search_url(sources: &SourcesConfig, subreddit: &str, query: &str) -> Result<Url, url::ParseError> {
    let endpoint = format!(
        "{}/r/{}/search.json",
        sources.reddit_base_url.trim_end_matches('/'),
        subreddit
    );
    let limit = sources.reddit_result_limit.to_string();
    Url::parse_with_params(
        &endpoint,
        &[
            ("q", query),
            ("restrict_sr", "true"),
            ("sort", "top"),
            ("limit", limit.as_str()),
            ("t", "all"),
        ],
    )
}

/// Decode a search listing into candidates.
///
/// # Arguments
///
/// * `body` - The `search.json` response body
/// * `subreddit` - The subreddit searched, recorded in the provenance
/// * `query` - The query searched, recorded in the provenance
///
/// # Returns
///
/// One candidate per post with an image, or with an album that has none.
///
/// # Errors
///
/// [`ParseError::Json`] if the body is not a listing at all. A malformed
/// post is logged and dropped without failing the listing.
pub fn parse_listing(body: &str, subreddit: &str, query: &str) -> Result<Vec<Candidate>, ParseError> {
    let listing: Listing = serde_json::from_str(body)?;
    let mut candidates = Vec::new();

    for (index, child) in listing.data.children.into_iter().enumerate() {
        let post = match serde_json::from_value::<Child>(child) {
            Ok(child) => child.data,
            Err(e) => {
                warn!(index, error = %e, "Skipping malformed Reddit post");
                continue;
            }
        };
        match post_to_candidate(post, subreddit, query) {
            Ok(Some(candidate)) => candidates.push(candidate),
            Ok(None) => {}
            Err(e) => warn!(index, error = %e, "Skipping incomplete Reddit post"),
        }
    }

    Ok(candidates)
}

fn post_to_candidate(post: Post, subreddit: &str, query: &str) -> Result<Option<Candidate>, ParseError> {
    if post.id.is_empty() {
        return Err(ParseError::MissingField("id"));
    }

    let image_url = match resolve_image(&post) {
        ImageRef::Direct(url) => Some(url),
        ImageRef::Album => None,
        ImageRef::Missing => {
            debug!(post_id = %post.id, "Post has no image");
            return Ok(None);
        }
    };

    let source_url = if post.permalink.is_empty() {
        format!("https://reddit.com/r/{subreddit}/comments/{}", post.id)
    } else {
        format!("https://reddit.com{}", post.permalink)
    };
    let created_at = (post.created_utc > 0.0)
        .then(|| DateTime::<Utc>::from_timestamp(post.created_utc as i64, 0))
        .flatten();

    let candidate = Candidate::new(
        Provenance::Reddit {
            subreddit: subreddit.to_string(),
            query: query.to_string(),
            post_id: post.id.clone(),
            author: post.author.filter(|a| !a.is_empty()),
            created_at,
            linked_url: (!post.url.is_empty()).then(|| decode_entities(&post.url)),
        },
        source_url,
        image_url,
    )
    .with_caption(Some(post.title.as_str()))
    .with_description(Some(post.selftext.as_str()))
    .with_identifier(&post.id)
    .with_engagement(Some(post.ups as f64), Some(post.num_comments as f64));

    Ok(Some(candidate))
}

fn resolve_image(post: &Post) -> ImageRef {
    let link = decode_entities(&post.url);

    if has_image_extension(&link) || link.contains("i.redd.it") {
        return parse_or_missing(&link);
    }

    if link.contains("imgur.com") {
        if link.contains("/gallery/") || link.contains("/a/") {
            return ImageRef::Album;
        }
        let id = link
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .and_then(|last| last.split('.').next())
            .unwrap_or_default();
        if id.is_empty() {
            return ImageRef::Missing;
        }
        return parse_or_missing(&format!("https://i.imgur.com/{id}.jpg"));
    }

    post.preview
        .as_ref()
        .and_then(|preview| preview.images.first())
        .and_then(largest_variant)
        .map(|variant| parse_or_missing(&decode_entities(&variant.url)))
        .unwrap_or(ImageRef::Missing)
}

/// Widest of the preview's downscaled resolutions and its source image.
fn largest_variant(image: &PreviewImage) -> Option<&PreviewVariant> {
    image
        .resolutions
        .iter()
        .chain(image.source.iter())
        .filter(|v| !v.url.is_empty())
        .max_by_key(|v| v.width)
}

fn parse_or_missing(url: &str) -> ImageRef {
    Url::parse(url).map(ImageRef::Direct).unwrap_or(ImageRef::Missing)
}

/// Undo the HTML escaping Reddit applies to URLs in listings.
pub fn decode_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
