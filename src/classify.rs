//! Keyword and subject matching against the target taxonomy.
//!
//! Matching is plain case-insensitive substring search. No stemming, no
//! word boundaries, no ranking of matches: the first subject in taxonomy
//! order that appears wins.

use crate::config::TargetTaxonomy;
use crate::models::Candidate;
use tracing::debug;

/// Outcome of classifying one piece of text plus its URL.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Classification {
    pub is_content_related: bool,
    pub is_subject_related: bool,
    pub subject_match: Option<String>,
    /// Distinct keywords found in the text (not the URL), in taxonomy order.
    pub matched_keywords: Vec<String>,
}

impl Classification {
    pub fn is_relevant(&self) -> bool {
        self.is_content_related || self.is_subject_related
    }
}

/// Classify descriptive `text` and an image or page `url`.
///
/// Keywords are searched in the text only, so a host like `foodandwine.com`
/// or a `/r/food/` path never makes an image content-related. Subjects are
/// searched in the text and the URL.
pub fn classify(text: &str, url: &str, taxonomy: &TargetTaxonomy) -> Classification {
    let text = text.to_lowercase();
    let url = url.to_lowercase();

    let matched_keywords: Vec<String> = taxonomy
        .keywords
        .iter()
        .filter(|k| !k.is_empty() && text.contains(&k.to_lowercase()))
        .cloned()
        .collect();
    let is_content_related = !matched_keywords.is_empty();

    let subject_match = taxonomy
        .subjects
        .iter()
        .find(|subject| {
            subject.spellings().any(|s| {
                let s = s.to_lowercase();
                !s.is_empty() && (text.contains(&s) || url.contains(&s))
            })
        })
        .map(|subject| subject.name.clone());

    Classification {
        is_content_related,
        is_subject_related: subject_match.is_some(),
        subject_match,
        matched_keywords,
    }
}

/// Classify a candidate in place, or drop it if it relates to nothing.
///
/// Stills found by searching for a subject keep that subject when their own
/// text names none.
pub fn tag(mut candidate: Candidate, taxonomy: &TargetTaxonomy) -> Option<Candidate> {
    let url = candidate
        .image_url
        .as_deref()
        .unwrap_or(&candidate.source_url)
        .to_string();
    let mut verdict = classify(&candidate.descriptive_text(), &url, taxonomy);

    if verdict.subject_match.is_none() {
        if let Some(subject) = candidate.provenance.searched_subject() {
            if taxonomy.contains_subject(subject) {
                verdict.subject_match = Some(subject.to_string());
                verdict.is_subject_related = true;
            }
        }
    }

    if !verdict.is_relevant() {
        debug!(url = %url, "Discarding candidate with no keyword or subject match");
        return None;
    }

    candidate.is_content_related = verdict.is_content_related;
    candidate.is_subject_related = verdict.is_subject_related;
    candidate.subject_match = verdict.subject_match;
    candidate.matched_keywords = verdict.matched_keywords;
    Some(candidate)
}
