//! Downloading the top-ranked candidates.
//!
//! The cap counts download attempts, failed ones included. Candidates with
//! no image URL are passed over without using up an attempt. Files are
//! named `{subject}-{identifier}.{ext}` from sanitized parts, so a re-run
//! overwrites the same files instead of adding copies.

use crate::config::RequestKind;
use crate::http::Fetcher;
use crate::models::{DownloadRecord, RankedCandidate};
use crate::scrapers::IMAGE_EXTENSIONS;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tracing::{error, info, instrument, warn};
use url::Url;

/// Extension used when neither the content type nor the URL names one.
pub const DEFAULT_EXTENSION: &str = "jpg";

const MAX_COMPONENT_LEN: usize = 60;

static UNSAFE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("static regex"));

/// Pick a file extension for downloaded bytes.
///
/// # Arguments
///
/// * `content_type` - The response's `Content-Type` header, if any
/// * `url` - The image URL, scanned for a known suffix
///
/// # Returns
///
/// The extension without a dot: from the content type first, then from the
/// URL, then [`DEFAULT_EXTENSION`].
///
/// # Examples
///
/// ```ignore
/// assert_eq!(infer_extension(Some("image/png"), "https://x/a.jpg"), "png");
/// assert_eq!(infer_extension(None, "https://x/a.JPEG"), "jpg");
/// ```
pub fn infer_extension(content_type: Option<&str>, url: &str) -> &'static str {
    if let Some(ct) = content_type.map(str::to_lowercase) {
        if ct.contains("jpeg") || ct.contains("jpg") {
            return "jpg";
        }
        if ct.contains("png") {
            return "png";
        }
        if ct.contains("webp") {
            return "webp";
        }
        if ct.contains("gif") {
            return "gif";
        }
    }

    let lower = url.to_lowercase();
    IMAGE_EXTENSIONS
        .iter()
        .find(|ext| lower.contains(*ext))
        .map(|ext| match *ext {
            ".jpeg" => "jpg",
            other => other.trim_start_matches('.'),
        })
        .unwrap_or(DEFAULT_EXTENSION)
}

/// Lowercase `part` and collapse every run of characters outside
/// `[A-Za-z0-9._-]` into a single `-`.
pub fn sanitize_component(part: &str) -> String {
    let lowered = part.to_lowercase();
    let replaced = UNSAFE_CHARS.replace_all(&lowered, "-");
    let trimmed: String = replaced
        .trim_matches(|c| c == '-' || c == '.')
        .chars()
        .take(MAX_COMPONENT_LEN)
        .collect();
    if trimmed.is_empty() {
        "x".to_string()
    } else {
        trimmed
    }
}

/// Build the file name for one downloaded image.
///
/// # Arguments
///
/// * `subject` - The matched subject, or the unidentified bucket name
/// * `identifier` - The candidate's stable identifier
/// * `extension` - The inferred extension, without a dot
///
/// # Returns
///
/// `{subject}-{identifier}.{ext}` with each part passed through
/// [`sanitize_component`], so the result only contains `[a-z0-9._-]`.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(file_name("Julie & Julia", "abc/123", "jpg"), "julie-julia-abc-123.jpg");
/// ```
pub fn file_name(subject: &str, identifier: &str, extension: &str) -> String {
    format!(
        "{}-{}.{}",
        sanitize_component(subject),
        sanitize_component(identifier),
        sanitize_component(extension)
    )
}

/// How many download attempts were made and how they ended.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DownloadSummary {
    pub attempted: usize,
    pub saved: usize,
    pub failed: usize,
    pub skipped_without_url: usize,
}

/// Download images for the first `cap` ranked candidates that have an image
/// URL, attaching a [`DownloadRecord`] to each one attempted.
///
/// Failures are recorded and the loop moves on to the next candidate.
///
/// # Arguments
///
/// * `fetcher` - Shared client; downloads are paced like crawl requests
/// * `ranked` - Candidates in rank order
/// * `cap` - Maximum number of download attempts
/// * `dir` - Existing, writable directory that receives the files
///
/// # Returns
///
/// A [`DownloadSummary`] with attempt, success, failure, and skip counts.
#[instrument(level = "info", skip(fetcher, ranked, dir), fields(dir = %dir.display()))]
pub async fn download_ranked(
    fetcher: &Fetcher,
    ranked: &mut [RankedCandidate],
    cap: usize,
    dir: &Path,
) -> DownloadSummary {
    let mut summary = DownloadSummary::default();

    for entry in ranked.iter_mut() {
        if summary.attempted >= cap {
            break;
        }
        let Some(image_url) = entry.candidate.image_url.clone() else {
            summary.skipped_without_url += 1;
            continue;
        };
        summary.attempted += 1;

        let record = download_one(
            fetcher,
            &image_url,
            entry.candidate.subject_key(),
            &entry.candidate.identifier,
            dir,
        )
        .await;
        if record.is_saved() {
            summary.saved += 1;
        } else {
            summary.failed += 1;
        }
        entry.attach_download(record);
    }

    info!(
        attempted = summary.attempted,
        saved = summary.saved,
        failed = summary.failed,
        skipped_without_url = summary.skipped_without_url,
        "Downloads finished"
    );
    summary
}

async fn download_one(
    fetcher: &Fetcher,
    image_url: &str,
    subject: &str,
    identifier: &str,
    dir: &Path,
) -> DownloadRecord {
    let url = match Url::parse(image_url) {
        Ok(url) => url,
        Err(e) => return DownloadRecord::failed(image_url, e),
    };

    let fetched = match fetcher.get_bytes(&url, RequestKind::Download).await {
        Ok(fetched) => fetched,
        Err(e) => {
            warn!(%url, error = %e, "Download failed");
            return DownloadRecord::failed(image_url, e);
        }
    };

    let ext = infer_extension(fetched.content_type.as_deref(), image_url);
    let path = dir.join(file_name(subject, identifier, ext));
    let byte_len = fetched.bytes.len() as u64;

    match tokio::fs::write(&path, &fetched.bytes).await {
        Ok(()) => {
            info!(path = %path.display(), bytes = byte_len, "Downloaded image");
            DownloadRecord::saved(image_url, path.display().to_string(), ext, byte_len)
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "Failed writing image");
            DownloadRecord::failed(image_url, e)
        }
    }
}
