//! Weighted metric estimation from search result counts.
//!
//! Result counts from four search verticals are combined with fixed
//! per-vertical weights:
//!
//! ```text
//! volume      = clamp( Σ w_v(source) × count(source), 0, VOLUME_CEILING )
//! competition = clamp( Σ w_c(source) × count(source) / COMPETITION_NORMALIZER, 0, 1 )
//! ```
//!
//! A missing count (failed request) contributes nothing. When every count
//! is missing there is no estimate at all and callers fall back to the
//! synthetic generator.

use serde::{Deserialize, Serialize};

use crate::models::CompetitionLevel;

pub const VOLUME_CEILING: i64 = 100_000;
pub const COMPETITION_NORMALIZER: f64 = 1_000_000.0;
pub const HIGH_COMPETITION_THRESHOLD: f64 = 0.7;
pub const MEDIUM_COMPETITION_THRESHOLD: f64 = 0.3;

/// Result counts per search vertical; `None` when that request failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResultCounts {
    pub blog: Option<u64>,
    pub news: Option<u64>,
    pub forum: Option<u64>,
    pub commerce: Option<u64>,
}

impl ResultCounts {
    pub fn any(&self) -> bool {
        self.blog.is_some() || self.news.is_some() || self.forum.is_some() || self.commerce.is_some()
    }

    /// Raw sum of the known counts.
    pub fn total(&self) -> u64 {
        [self.blog, self.news, self.forum, self.commerce]
            .iter()
            .flatten()
            .fold(0u64, |acc, c| acc.saturating_add(*c))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceWeights {
    pub blog: f64,
    pub news: f64,
    pub forum: f64,
    pub commerce: f64,
}

impl SourceWeights {
    /// Weights used for the volume score.
    pub const VOLUME: SourceWeights = SourceWeights {
        blog: 0.04,
        news: 0.01,
        forum: 0.03,
        commerce: 0.02,
    };

    /// Weights used for the competition score.
    pub const COMPETITION: SourceWeights = SourceWeights {
        blog: 0.4,
        news: 0.1,
        forum: 0.3,
        commerce: 0.2,
    };

    fn weighted_sum(&self, counts: &ResultCounts) -> f64 {
        let term = |w: f64, c: Option<u64>| c.map(|c| w * c as f64).unwrap_or(0.0);
        term(self.blog, counts.blog)
            + term(self.news, counts.news)
            + term(self.forum, counts.forum)
            + term(self.commerce, counts.commerce)
    }
}

/// Estimated metrics for one keyword, before persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsEstimate {
    pub search_volume: i64,
    pub competition_level: CompetitionLevel,
    pub competition_index: f64,
    pub document_count: Option<i64>,
}

pub fn volume_score(counts: &ResultCounts, weights: &SourceWeights) -> i64 {
    let raw = weights.weighted_sum(counts);
    if !raw.is_finite() || raw <= 0.0 {
        return 0;
    }
    (raw.round() as i64).clamp(0, VOLUME_CEILING)
}

pub fn competition_score(counts: &ResultCounts, weights: &SourceWeights) -> f64 {
    let raw = weights.weighted_sum(counts) / COMPETITION_NORMALIZER;
    if raw.is_nan() {
        return 0.0;
    }
    raw.clamp(0.0, 1.0)
}

/// Map a competition score to its bucket. Monotonic; NaN maps to `Low`.
pub fn competition_level(score: f64) -> CompetitionLevel {
    if score >= HIGH_COMPETITION_THRESHOLD {
        CompetitionLevel::High
    } else if score >= MEDIUM_COMPETITION_THRESHOLD {
        CompetitionLevel::Medium
    } else {
        CompetitionLevel::Low
    }
}

/// Combine vertical counts into an estimate; `None` when every count is missing.
pub fn estimate_metrics(counts: &ResultCounts) -> Option<MetricsEstimate> {
    if !counts.any() {
        return None;
    }
    let competition = competition_score(counts, &SourceWeights::COMPETITION);
    Some(MetricsEstimate {
        search_volume: volume_score(counts, &SourceWeights::VOLUME),
        competition_level: competition_level(competition),
        competition_index: round_to(competition, 4),
        document_count: Some(counts.total().min(i64::MAX as u64) as i64),
    })
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
