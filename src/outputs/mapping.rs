//! Per-subject image list consumed by the front end.
//!
//! Only subject-matched candidates appear, in rank order.

use crate::error::PersistenceError;
use crate::models::RankedCandidate;
use crate::outputs::write_file;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::instrument;

pub const MAPPING_FILE: &str = "image_mapping.json";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappedImage {
    pub url: String,
    pub alt: String,
    pub caption: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_path: Option<String>,
}

/// Group subject-matched candidates that have an image URL by subject.
pub fn build_mapping(ranked: &[RankedCandidate]) -> BTreeMap<String, Vec<MappedImage>> {
    let mut mapping: BTreeMap<String, Vec<MappedImage>> = BTreeMap::new();
    for entry in ranked {
        let c = &entry.candidate;
        let (Some(subject), Some(url)) = (&c.subject_match, &c.image_url) else {
            continue;
        };
        mapping.entry(subject.clone()).or_default().push(MappedImage {
            url: url.clone(),
            alt: c.alt_text.clone().unwrap_or_default(),
            caption: c.caption.clone().unwrap_or_default(),
            source: c.source_url.clone(),
            local_path: entry
                .download()
                .and_then(|d| d.local_path())
                .map(str::to_string),
        });
    }
    mapping
}

#[instrument(level = "info", skip_all, fields(output_dir = %output_dir.display()))]
pub async fn write_mapping(
    ranked: &[RankedCandidate],
    output_dir: &Path,
) -> Result<PathBuf, PersistenceError> {
    let mapping = build_mapping(ranked);
    let json = serde_json::to_string_pretty(&mapping)?;
    let path = output_dir.join(MAPPING_FILE);
    write_file(&path, json.as_bytes()).await?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Candidate, Provenance};
    use url::Url;

    fn entry(subject: Option<&str>, image: Option<&str>, score: f64) -> RankedCandidate {
        let mut c = Candidate::new(
            Provenance::Editorial {
                page_url: "https://example.com/list".into(),
            },
            "https://example.com/list",
            image.map(|u| Url::parse(u).unwrap()),
        )
        .with_alt_text(Some("alt"));
        c.subject_match = subject.map(str::to_string);
        RankedCandidate::new(c, score)
    }

    #[test]
    fn test_mapping_keeps_only_subject_matched_images() {
        let ranked = vec![
            entry(Some("Chef"), Some("https://x/1.jpg"), 30.0),
            entry(None, Some("https://x/2.jpg"), 25.0),
            entry(Some("Chef"), None, 22.0),
            entry(Some("Burnt"), Some("https://x/3.jpg"), 20.0),
            entry(Some("Chef"), Some("https://x/4.jpg"), 20.0),
        ];
        let mapping = build_mapping(&ranked);
        assert_eq!(mapping.keys().collect::<Vec<_>>(), vec!["Burnt", "Chef"]);
        let chef: Vec<&str> = mapping["Chef"].iter().map(|m| m.url.as_str()).collect();
        assert_eq!(chef, vec!["https://x/1.jpg", "https://x/4.jpg"]);
        assert_eq!(mapping["Chef"][0].alt, "alt");
        assert_eq!(mapping["Chef"][0].caption, "");
        assert_eq!(mapping["Chef"][0].local_path, None);
    }
}
