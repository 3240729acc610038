//! Synthetic fallback provider.
//!
//! Produces plausible metrics and trend series when every real source for
//! a category has failed or is unconfigured. Output is randomized but
//! deterministic per keyword: the RNG is seeded from a SHA-256 of the
//! keyword, so repeated fallbacks for the same keyword agree with each
//! other. Everything it returns is tagged [`source_tags::FALLBACK`].
//!
//! Trend series combine four factors per point:
//!
//! ```text
//! value = clamp( base × seasonal(month) × (1 + rate)^step × noise, 1, 100 )
//! ```
//!
//! - `seasonal`: ×1.3 inside the season named by the keyword, ×0.8 outside;
//!   without a season name, ×1.2 in Dec–Feb and ×0.9 in Jul–Aug.
//! - `rate`: chosen by direction words in the keyword (rising/falling),
//!   +2% per step otherwise, compounded from the oldest point.
//! - `noise`: uniform in `[0.8, 1.2]`.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};

use crate::models::source_tags;
use crate::providers::{
    MetricsSample, MetricsSource, TrendSample, TrendSeries, TrendSource, TrendWindow,
};
use crate::scoring::{competition_level, MetricsEstimate, VOLUME_CEILING};

pub const TREND_MIN: i64 = 1;
pub const TREND_MAX: i64 = 100;
const TREND_BASE: f64 = 40.0;
const DEFAULT_TREND_RATE: f64 = 0.02;
const MIN_TREND_FACTOR: f64 = 0.5;

const METRICS_SALT: u64 = 0x6d65_7472_6963_7321;
const TRENDS_SALT: u64 = 0x7472_656e_6473_2121;

/// Season words and their in-season months (0 = January).
const SEASONS: &[(&[&str], &[u32])] = &[
    (&["여름", "summer"], &[5, 6, 7, 8]),
    (&["겨울", "winter"], &[11, 0, 1, 2]),
    (&["봄", "spring"], &[2, 3, 4]),
    (&["가을", "autumn", "fall"], &[8, 9, 10]),
];

/// Direction words and their per-step rate.
const DIRECTIONS: &[(&[&str], f64)] = &[
    (&["급증", "surge", "booming"], 0.10),
    (&["증가", "rising", "growing"], 0.05),
    (&["하락", "plunge", "crash"], -0.05),
    (&["감소", "falling", "declining"], -0.03),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticProvider;

impl SyntheticProvider {
    pub fn new() -> Self {
        Self
    }

    /// Deterministic metrics estimate; shorter keywords read as broader,
    /// more searched and more contested.
    pub fn metrics(&self, keyword: &str) -> MetricsEstimate {
        let mut rng = rng_for(keyword, METRICS_SALT);
        let len = keyword.chars().filter(|c| !c.is_whitespace()).count().max(1) as f64;

        let base = (VOLUME_CEILING as f64 / 10.0) / len;
        let volume = (base * rng.gen_range(0.5..=1.5)).round() as i64;

        let index = (0.9 - 0.08 * len + rng.gen_range(-0.1..=0.1)).clamp(0.05, 0.95);
        let index = (index * 100.0).round() / 100.0;

        MetricsEstimate {
            search_volume: volume.clamp(10, VOLUME_CEILING),
            competition_level: competition_level(index),
            competition_index: index,
            document_count: None,
        }
    }

    /// Deterministic trend series for `window`, ending at `today`.
    pub fn trends(&self, keyword: &str, window: TrendWindow, today: NaiveDate) -> Vec<TrendSample> {
        let mut rng = rng_for(keyword, TRENDS_SALT);
        let rate = trend_rate(keyword);
        let fmt = match window {
            TrendWindow::Monthly => "%Y-%m-01",
            TrendWindow::Daily => "%Y-%m-%d",
        };

        window
            .dates(today)
            .into_iter()
            .enumerate()
            .map(|(step, date)| {
                let direction = (1.0 + rate).powi(step as i32).max(MIN_TREND_FACTOR);
                let noise = rng.gen_range(0.8..=1.2);
                let raw = TREND_BASE * seasonal_factor(date.month0(), keyword) * direction * noise;
                TrendSample {
                    date: date.format(fmt).to_string(),
                    value: (raw.round() as i64).clamp(TREND_MIN, TREND_MAX),
                }
            })
            .collect()
    }
}

fn rng_for(keyword: &str, salt: u64) -> StdRng {
    let digest = Sha256::digest(keyword.as_bytes());
    let mut seed = [0u8; 8];
    seed.copy_from_slice(&digest[..8]);
    StdRng::seed_from_u64(u64::from_le_bytes(seed) ^ salt)
}

/// Whether `keyword` (already lowercased) mentions `word`. Hangul words
/// match anywhere since compounds are usually written without spaces;
/// Latin words must be a whole alphanumeric token.
fn mentions(keyword: &str, word: &str) -> bool {
    if !word.is_ascii() {
        return keyword.contains(word);
    }
    keyword
        .split(|c: char| !c.is_alphanumeric())
        .any(|token| token == word)
}

/// Seasonal multiplier for a zero-based month.
pub fn seasonal_factor(month0: u32, keyword: &str) -> f64 {
    let lower = keyword.to_lowercase();
    for (words, months) in SEASONS {
        if words.iter().any(|w| mentions(&lower, w)) {
            return if months.contains(&month0) { 1.3 } else { 0.8 };
        }
    }
    match month0 {
        11 | 0 | 1 => 1.2,
        6 | 7 => 0.9,
        _ => 1.0,
    }
}

/// Per-step compounding rate implied by direction words in the keyword.
pub fn trend_rate(keyword: &str) -> f64 {
    let lower = keyword.to_lowercase();
    DIRECTIONS
        .iter()
        .find(|(words, _)| words.iter().any(|w| mentions(&lower, w)))
        .map(|(_, rate)| *rate)
        .unwrap_or(DEFAULT_TREND_RATE)
}

#[async_trait]
impl MetricsSource for SyntheticProvider {
    async fn fetch_metrics(&self, keyword: &str) -> Result<MetricsSample> {
        Ok(MetricsSample {
            estimate: self.metrics(keyword),
            source: source_tags::FALLBACK.to_string(),
        })
    }
}

#[async_trait]
impl TrendSource for SyntheticProvider {
    async fn fetch_trends(
        &self,
        keyword: &str,
        window: TrendWindow,
        today: NaiveDate,
    ) -> Result<TrendSeries> {
        Ok(TrendSeries {
            points: self.trends(keyword, window, today),
            source: source_tags::FALLBACK.to_string(),
        })
    }
}
