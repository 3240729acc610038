//! Freshness classification and cache policy.
//!
//! Two independent boundaries govern a category record:
//!
//! | Age | Label | Refresh? |
//! |-----|-------|----------|
//! | absent | `processing` | yes |
//! | `age <= fresh_for` | `fresh` | no |
//! | `fresh_for < age <= refresh_after` | `stale` | no |
//! | `age > refresh_after` | `processing` | yes |
//!
//! Both boundaries are inclusive on the younger side: a record exactly
//! `fresh_for` old is still fresh, one exactly `refresh_after` old is stale
//! and not yet eligible for refresh. Negative ages (clock skew) count as zero.
//!
//! The composite report cache uses a separate TTL: a long one when metrics
//! exist, a short one while metrics are still absent so the placeholder is
//! revisited soon.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Display label derived from record age.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Freshness {
    Fresh,
    Stale,
    Processing,
}

impl Freshness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Freshness::Fresh => "fresh",
            Freshness::Stale => "stale",
            Freshness::Processing => "processing",
        }
    }
}

impl fmt::Display for Freshness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct FreshnessPolicy {
    /// Records at most this old are labeled `fresh`.
    pub fresh_for: Duration,
    /// Records older than this are refreshed and labeled `processing`.
    pub refresh_after: Duration,
    /// Report cache TTL when a metrics record is present.
    pub report_ttl: std::time::Duration,
    /// Report cache TTL when metrics are absent.
    pub pending_report_ttl: std::time::Duration,
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self {
            fresh_for: Duration::hours(6),
            refresh_after: Duration::hours(24),
            report_ttl: std::time::Duration::from_secs(60 * 60),
            pending_report_ttl: std::time::Duration::from_secs(10 * 60),
        }
    }
}

impl FreshnessPolicy {
    /// Classify a record age.
    pub fn classify_age(&self, age: Duration) -> Freshness {
        let age = age.max(Duration::zero());
        if age <= self.fresh_for {
            Freshness::Fresh
        } else if age <= self.refresh_after {
            Freshness::Stale
        } else {
            Freshness::Processing
        }
    }

    /// Classify a record by its collection time; absent records are `processing`.
    pub fn classify(&self, collected_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Freshness {
        match collected_at {
            Some(at) => self.classify_age(now - at),
            None => Freshness::Processing,
        }
    }

    /// `true` when the record is absent or older than `refresh_after`.
    ///
    /// Independent of the fresh/stale display boundary.
    pub fn should_refresh(&self, collected_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match collected_at {
            Some(at) => (now - at).max(Duration::zero()) > self.refresh_after,
            None => true,
        }
    }

    /// TTL for a composite report, chosen by whether metrics exist.
    pub fn report_ttl(&self, has_metrics: bool) -> std::time::Duration {
        if has_metrics {
            self.report_ttl
        } else {
            self.pending_report_ttl
        }
    }
}

/// Age of a record in fractional hours (never negative).
pub fn age_hours(collected_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let secs = (now - collected_at).num_seconds().max(0);
    secs as f64 / 3600.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_classify_examples() {
        let p = FreshnessPolicy::default();
        assert_eq!(p.classify_age(Duration::zero()), Freshness::Fresh);
        assert_eq!(p.classify_age(Duration::hours(7)), Freshness::Stale);
        assert_eq!(p.classify_age(Duration::hours(25)), Freshness::Processing);
    }

    #[test]
    fn test_classify_boundaries_inclusive_on_younger_side() {
        let p = FreshnessPolicy::default();
        assert_eq!(p.classify_age(Duration::hours(6)), Freshness::Fresh);
        assert_eq!(
            p.classify_age(Duration::hours(6) + Duration::seconds(1)),
            Freshness::Stale
        );
        assert_eq!(p.classify_age(Duration::hours(24)), Freshness::Stale);
        assert_eq!(
            p.classify_age(Duration::hours(24) + Duration::seconds(1)),
            Freshness::Processing
        );
    }

    #[test]
    fn test_negative_age_is_fresh() {
        let p = FreshnessPolicy::default();
        assert_eq!(p.classify_age(Duration::hours(-3)), Freshness::Fresh);
        assert!(!p.should_refresh(Some(t0() + Duration::hours(1)), t0()));
    }

    #[test]
    fn test_absent_record() {
        let p = FreshnessPolicy::default();
        assert_eq!(p.classify(None, t0()), Freshness::Processing);
        assert!(p.should_refresh(None, t0()));
    }

    #[test]
    fn test_should_refresh_ignores_display_boundary() {
        let p = FreshnessPolicy::default();
        let now = t0();
        assert!(!p.should_refresh(Some(now - Duration::hours(7)), now));
        assert!(!p.should_refresh(Some(now - Duration::hours(24)), now));
        assert!(p.should_refresh(Some(now - Duration::hours(25)), now));
    }

    #[test]
    fn test_classify_is_monotonic_in_age() {
        let p = FreshnessPolicy::default();
        let rank = |f: Freshness| match f {
            Freshness::Fresh => 0,
            Freshness::Stale => 1,
            Freshness::Processing => 2,
        };
        let mut prev = 0;
        for minutes in (0..=60 * 48).step_by(15) {
            let r = rank(p.classify_age(Duration::minutes(minutes)));
            assert!(r >= prev, "label went backwards at {} minutes", minutes);
            prev = r;
        }
    }

    #[test]
    fn test_report_ttl() {
        let p = FreshnessPolicy::default();
        assert_eq!(p.report_ttl(true), std::time::Duration::from_secs(3600));
        assert_eq!(p.report_ttl(false), std::time::Duration::from_secs(600));
    }

    #[test]
    fn test_age_hours() {
        assert_eq!(age_hours(t0(), t0() + Duration::minutes(90)), 1.5);
        assert_eq!(age_hours(t0(), t0() - Duration::hours(1)), 0.0);
    }
}
