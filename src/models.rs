//! Data models for discovered images and the persisted run record.
//!
//! - [`Candidate`]: an image reference found by one of the source adapters,
//!   carrying the text used to classify it
//! - [`RankedCandidate`]: a candidate with its final quality score and, once
//!   the downloader has visited it, a [`DownloadRecord`]
//! - [`RunMetadata`]: the JSON artifact written at the end of a run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use url::Url;

/// Bucket name for candidates that matched no subject.
pub const UNIDENTIFIED_SUBJECT: &str = "unidentified";

/// Which adapter produced a candidate, with the adapter-specific context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Provenance {
    /// An `<img>` on an editorial article.
    Editorial { page_url: String },
    /// A still from the stills database, found by searching for `subject`.
    StillsDb { subject: String, detail_url: String },
    /// A Reddit post returned by a subreddit search.
    Reddit {
        subreddit: String,
        query: String,
        post_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        author: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        created_at: Option<DateTime<Utc>>,
        /// The link the post points at, before image resolution.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        linked_url: Option<String>,
    },
}

impl Provenance {
    /// Key used to group candidates by source in the run metadata.
    ///
    /// Editorial pages group by host, Reddit by subreddit.
    pub fn source_key(&self) -> String {
        match self {
            Provenance::Editorial { page_url } => Url::parse(page_url)
                .ok()
                .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
                .unwrap_or_else(|| "editorial".to_string()),
            Provenance::StillsDb { .. } => "moviestillsdb".to_string(),
            Provenance::Reddit { subreddit, .. } => format!("r/{subreddit}"),
        }
    }

    /// The subject a stills-db search was run for, if any.
    pub fn searched_subject(&self) -> Option<&str> {
        match self {
            Provenance::StillsDb { subject, .. } => Some(subject),
            _ => None,
        }
    }
}

/// A discovered image reference.
///
/// Adapters build candidates through [`Candidate::new`] and the `with_*`
/// methods; the classification fields are filled in later by
/// [`crate::classify::tag`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub source_url: String,
    /// Absolute http(s) URL of the raw image, if one could be resolved.
    pub image_url: Option<String>,
    pub alt_text: Option<String>,
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Stable per-source identifier used to name the downloaded file.
    pub identifier: String,
    pub subject_match: Option<String>,
    pub is_subject_related: bool,
    pub is_content_related: bool,
    /// Distinct taxonomy keywords found in the descriptive text.
    #[serde(default)]
    pub matched_keywords: Vec<String>,
    /// Upvotes, for sources that expose them.
    pub engagement_signal: Option<f64>,
    /// Comment count, for sources that expose it.
    pub discussion_signal: Option<f64>,
    pub provenance: Provenance,
}

impl Candidate {
    /// Create an unclassified candidate.
    ///
    /// Non-http(s) image URLs are dropped, so `image_url` is either absent or
    /// dereferenceable.
    pub fn new(provenance: Provenance, source_url: impl Into<String>, image_url: Option<Url>) -> Self {
        let image_url = image_url.filter(|u| matches!(u.scheme(), "http" | "https"));
        let source_url = source_url.into();
        let identifier = match &image_url {
            Some(url) => identifier_from_url(url),
            None => Url::parse(&source_url)
                .map(|url| identifier_from_url(&url))
                .unwrap_or_else(|_| format!("image-{}", short_digest(&source_url))),
        };

        Self {
            source_url,
            image_url: image_url.map(String::from),
            alt_text: None,
            caption: None,
            description: None,
            identifier,
            subject_match: None,
            is_subject_related: false,
            is_content_related: false,
            matched_keywords: Vec::new(),
            engagement_signal: None,
            discussion_signal: None,
            provenance,
        }
    }

    pub fn with_alt_text(mut self, alt: Option<&str>) -> Self {
        self.alt_text = non_empty(alt);
        self
    }

    pub fn with_caption(mut self, caption: Option<&str>) -> Self {
        self.caption = non_empty(caption);
        self
    }

    pub fn with_description(mut self, description: Option<&str>) -> Self {
        self.description = non_empty(description);
        self
    }

    pub fn with_identifier(mut self, identifier: &str) -> Self {
        if !identifier.trim().is_empty() {
            self.identifier = identifier.trim().to_string();
        }
        self
    }

    pub fn with_engagement(mut self, upvotes: Option<f64>, comments: Option<f64>) -> Self {
        self.engagement_signal = upvotes;
        self.discussion_signal = comments;
        self
    }

    /// Alt text, caption, and description joined with spaces.
    pub fn descriptive_text(&self) -> String {
        [&self.alt_text, &self.caption, &self.description]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Key used to drop repeated discoveries of the same image.
    pub fn dedup_key(&self) -> &str {
        self.image_url.as_deref().unwrap_or(&self.source_url)
    }

    pub fn subject_key(&self) -> &str {
        self.subject_match.as_deref().unwrap_or(UNIDENTIFIED_SUBJECT)
    }

    pub fn source_key(&self) -> String {
        self.provenance.source_key()
    }
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

/// Characters of the readable stem kept in a URL-derived identifier.
const IDENTIFIER_STEM_LEN: usize = 40;

/// Last non-empty path segment without its extension (else the host, else
/// `image`), followed by a digest of the whole URL.
///
/// Two different URLs with the same file stem, like `a/still.jpg` and
/// `b/still.jpg`, therefore get different identifiers, while the same URL
/// always gets the same one.
fn identifier_from_url(url: &Url) -> String {
    let stem = url
        .path_segments()
        .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
        .map(|s| match s.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => s,
        })
        .or_else(|| url.host_str())
        .map(|s| urlencoding::decode(s).map(|c| c.into_owned()).unwrap_or_else(|_| s.to_string()))
        .unwrap_or_else(|| "image".to_string());
    let stem: String = stem.chars().take(IDENTIFIER_STEM_LEN).collect();
    format!("{stem}-{}", short_digest(url.as_str()))
}

/// First 8 hex digits of the SHA-256 of `s`.
fn short_digest(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    hash[..8].to_string()
}

/// Result of trying to materialize one candidate on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadRecord {
    pub image_url: String,
    #[serde(flatten)]
    pub outcome: DownloadOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DownloadOutcome {
    Saved {
        local_path: String,
        extension: String,
        byte_len: u64,
    },
    Failed {
        reason: String,
    },
}

impl DownloadRecord {
    pub fn saved(image_url: &str, local_path: String, extension: &str, byte_len: u64) -> Self {
        Self {
            image_url: image_url.to_string(),
            outcome: DownloadOutcome::Saved {
                local_path,
                extension: extension.to_string(),
                byte_len,
            },
        }
    }

    pub fn failed(image_url: &str, reason: impl ToString) -> Self {
        Self {
            image_url: image_url.to_string(),
            outcome: DownloadOutcome::Failed {
                reason: reason.to_string(),
            },
        }
    }

    pub fn is_saved(&self) -> bool {
        matches!(self.outcome, DownloadOutcome::Saved { .. })
    }

    pub fn local_path(&self) -> Option<&str> {
        match &self.outcome {
            DownloadOutcome::Saved { local_path, .. } => Some(local_path),
            DownloadOutcome::Failed { .. } => None,
        }
    }
}

/// A classified candidate with its final score.
///
/// The score is fixed when the value is built by [`crate::scoring::rank`];
/// there is no setter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    #[serde(flatten)]
    pub candidate: Candidate,
    quality_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    download: Option<DownloadRecord>,
}

impl RankedCandidate {
    pub(crate) fn new(candidate: Candidate, quality_score: f64) -> Self {
        Self {
            candidate,
            quality_score,
            download: None,
        }
    }

    pub fn quality_score(&self) -> f64 {
        self.quality_score
    }

    pub fn download(&self) -> Option<&DownloadRecord> {
        self.download.as_ref()
    }

    /// Attach the downloader's outcome. A candidate is downloaded at most
    /// once per run, so a second record is ignored.
    pub fn attach_download(&mut self, record: DownloadRecord) {
        if self.download.is_none() {
            self.download = Some(record);
        }
    }
}

/// The persisted artifact of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub scraped_at: DateTime<Utc>,
    pub total_images: usize,
    pub by_subject: BTreeMap<String, Vec<RankedCandidate>>,
    pub by_source: BTreeMap<String, Vec<RankedCandidate>>,
    pub images: Vec<RankedCandidate>,
}

impl RunMetadata {
    /// Project the ranked list into the persisted shape. Grouping keeps rank
    /// order within each bucket and filters nothing.
    pub fn from_ranked(ranked: &[RankedCandidate], scraped_at: DateTime<Utc>) -> Self {
        let mut by_subject: BTreeMap<String, Vec<RankedCandidate>> = BTreeMap::new();
        let mut by_source: BTreeMap<String, Vec<RankedCandidate>> = BTreeMap::new();
        for entry in ranked {
            by_subject
                .entry(entry.candidate.subject_key().to_string())
                .or_default()
                .push(entry.clone());
            by_source
                .entry(entry.candidate.source_key())
                .or_default()
                .push(entry.clone());
        }
        Self {
            scraped_at,
            total_images: ranked.len(),
            by_subject,
            by_source,
            images: ranked.to_vec(),
        }
    }
}
