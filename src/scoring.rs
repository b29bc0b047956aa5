//! Quality scoring and ranking.
//!
//! The score is a sum of independently capped terms:
//!
//! ```text
//! min(upvotes / engagement_divisor, engagement_cap)
//!   + subject_bonus                          if a subject matched
//!   + keyword_bonus * distinct non-generic keywords in the text
//!   + min(comments / discussion_divisor, discussion_cap)
//! ```
//!
//! Each candidate is scored exactly once, when [`rank`] wraps it in a
//! [`RankedCandidate`].

use crate::config::{ScoreWeights, TargetTaxonomy};
use crate::models::{Candidate, RankedCandidate};
use std::cmp::Ordering;
use tracing::{debug, instrument};

/// Score one classified candidate.
///
/// # Arguments
///
/// * `candidate` - A candidate that has been through [`crate::classify::tag`]
/// * `taxonomy` - Supplies the generic keywords that earn no bonus
/// * `weights` - Divisors, caps, and bonuses of the four terms
///
/// # Returns
///
/// The sum of the capped terms. Pure: equal inputs give equal scores.
pub fn score(candidate: &Candidate, taxonomy: &TargetTaxonomy, weights: &ScoreWeights) -> f64 {
    let engagement = candidate
        .engagement_signal
        .map(|ups| (ups / weights.engagement_divisor).min(weights.engagement_cap))
        .unwrap_or(0.0);

    let subject = if candidate.subject_match.is_some() {
        weights.subject_bonus
    } else {
        0.0
    };

    let specific_keywords = candidate
        .matched_keywords
        .iter()
        .filter(|k| {
            !taxonomy
                .generic_keywords
                .iter()
                .any(|g| g.eq_ignore_ascii_case(k))
        })
        .count();
    let keywords = specific_keywords as f64 * weights.keyword_bonus;

    let discussion = candidate
        .discussion_signal
        .map(|comments| (comments / weights.discussion_divisor).min(weights.discussion_cap))
        .unwrap_or(0.0);

    engagement + subject + keywords + discussion
}

/// Score every candidate and sort by descending score. The sort is stable,
/// so equal scores keep discovery order.
#[instrument(level = "info", skip_all, fields(count = candidates.len()))]
pub fn rank(
    candidates: Vec<Candidate>,
    taxonomy: &TargetTaxonomy,
    weights: &ScoreWeights,
) -> Vec<RankedCandidate> {
    let mut ranked: Vec<RankedCandidate> = candidates
        .into_iter()
        .map(|c| {
            let s = score(&c, taxonomy, weights);
            RankedCandidate::new(c, s)
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.quality_score()
            .partial_cmp(&a.quality_score())
            .unwrap_or(Ordering::Equal)
    });

    if let Some(top) = ranked.first() {
        debug!(
            top_score = top.quality_score(),
            top_subject = top.candidate.subject_key(),
            "Ranked candidates"
        );
    }
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Provenance;

    fn candidate(id: &str) -> Candidate {
        Candidate::new(
            Provenance::Editorial {
                page_url: "https://example.com".into(),
            },
            "https://example.com",
            None,
        )
        .with_identifier(id)
    }

    #[test]
    fn test_score_terms_and_caps() {
        let tax = TargetTaxonomy::default();
        let w = ScoreWeights::default();

        let mut c = candidate("a").with_engagement(Some(250.0), Some(30.0));
        c.subject_match = Some("Goodfellas".into());
        c.matched_keywords = vec!["food".into(), "dinner".into(), "prison dinner".into()];
        // 2.5 + 20 + 2 * 2 + 3
        assert_eq!(score(&c, &tax, &w), 29.5);

        let capped = candidate("b").with_engagement(Some(50_000.0), Some(10_000.0));
        assert_eq!(score(&capped, &tax, &w), 15.0);

        assert_eq!(score(&candidate("c"), &tax, &w), 0.0);
    }

    #[test]
    fn test_score_is_deterministic() {
        let tax = TargetTaxonomy::default();
        let w = ScoreWeights::default();
        let mut c = candidate("a").with_engagement(Some(123.0), Some(7.0));
        c.matched_keywords = vec!["pasta".into()];
        assert_eq!(score(&c, &tax, &w), score(&c.clone(), &tax, &w));
    }

    #[test]
    fn test_subject_match_outranks_capped_engagement() {
        let tax = TargetTaxonomy::default();
        let w = ScoreWeights::default();
        let popular = candidate("popular").with_engagement(Some(1000.0), None);
        let mut on_subject = candidate("subject").with_engagement(Some(0.0), None);
        on_subject.subject_match = Some("Big Night".into());

        let ranked = rank(vec![popular, on_subject], &tax, &w);
        assert_eq!(ranked[0].candidate.identifier, "subject");
        assert_eq!(ranked[0].quality_score(), 20.0);
        assert_eq!(ranked[1].quality_score(), 10.0);
    }

    #[test]
    fn test_rank_is_stable_for_ties() {
        let tax = TargetTaxonomy::default();
        let w = ScoreWeights::default();
        let mut high = candidate("high");
        high.subject_match = Some("Chef".into());
        let input = vec![
            candidate("t1"),
            candidate("t2"),
            high,
            candidate("t3"),
            candidate("t4"),
        ];

        let order: Vec<String> = rank(input, &tax, &w)
            .into_iter()
            .map(|r| r.candidate.identifier)
            .collect();
        assert_eq!(order, vec!["high", "t1", "t2", "t3", "t4"]);
    }

    #[test]
    fn test_overridden_weights() {
        let tax = TargetTaxonomy::default();
        let w = ScoreWeights {
            subject_bonus: 5.0,
            ..ScoreWeights::default()
        };
        let mut c = candidate("a");
        c.subject_match = Some("Burnt".into());
        assert_eq!(score(&c, &tax, &w), 5.0);
    }
}
