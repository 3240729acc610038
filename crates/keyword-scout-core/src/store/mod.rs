//! Storage abstraction for Keyword Scout.
//!
//! The [`KeywordStore`] trait is the repository every research operation
//! goes through: search history, the four category tables, and the
//! composite report cache. Writes follow find-or-create + overwrite
//! semantics on each table's natural key (last writer wins); callers that
//! need stronger guarantees serialize per key themselves.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//! [`memory::InMemoryStore`] lives here; the SQLite store lives in the
//! root crate.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{KeywordRecord, MetricsRecord, RelatedTerm, TagSuggestion, TrendPoint};

/// Abstract storage backend for Keyword Scout.
///
/// # Natural keys
///
/// | Table | Key | Write semantics |
/// |-------|-----|-----------------|
/// | history | keyword | count increments, `last_searched_at` moves |
/// | metrics | (keyword, period) | overwrite |
/// | trends | (keyword, date) | overwrite |
/// | related terms | (root, term) | replace whole set per root |
/// | tag suggestions | (root, tag) | `frequency` accumulates, rest overwrites |
/// | report cache | key | overwrite; expired entries are invisible |
#[async_trait]
pub trait KeywordStore: Send + Sync {
    /// Record one search of `keyword` at `at`, creating the history row if needed.
    async fn record_search(&self, keyword: &str, at: DateTime<Utc>) -> Result<KeywordRecord>;

    async fn get_keyword(&self, keyword: &str) -> Result<Option<KeywordRecord>>;

    /// History rows whose keyword starts with `prefix`, most recently searched first.
    async fn list_keywords(&self, prefix: Option<&str>, limit: usize) -> Result<Vec<KeywordRecord>>;

    async fn upsert_metrics(&self, record: &MetricsRecord) -> Result<()>;

    /// Metrics for the most recent period.
    async fn latest_metrics(&self, keyword: &str) -> Result<Option<MetricsRecord>>;

    async fn upsert_trends(&self, points: &[TrendPoint]) -> Result<()>;

    /// The most recent `limit` points, returned oldest first.
    async fn trends(&self, keyword: &str, limit: usize) -> Result<Vec<TrendPoint>>;

    /// Replace the related terms of `root` with `terms`.
    async fn replace_related_terms(&self, root: &str, terms: &[RelatedTerm]) -> Result<()>;

    /// Related terms of `root`, by descending relevance.
    async fn related_terms(&self, root: &str) -> Result<Vec<RelatedTerm>>;

    /// Insert tags, adding `frequency` to any existing row with the same key.
    async fn upsert_tags(&self, tags: &[TagSuggestion]) -> Result<()>;

    /// Tags of `root` by descending frequency, ties by tag.
    async fn tag_suggestions(&self, root: &str, limit: usize) -> Result<Vec<TagSuggestion>>;

    /// Cached report payload, if present and not expired at `now`.
    async fn get_cached_report(&self, key: &str, now: DateTime<Utc>) -> Result<Option<String>>;

    async fn put_cached_report(
        &self,
        key: &str,
        keyword: &str,
        payload: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Drop cached reports for one keyword, or all of them. Returns rows removed.
    async fn clear_reports(&self, keyword: Option<&str>) -> Result<u64>;

    /// Drop history and every category row for one keyword, or for all
    /// keywords. Cached reports go with them. Returns history rows removed.
    async fn clear_history(&self, keyword: Option<&str>) -> Result<u64>;
}

/// Most recent `collected_at` among a set of rows.
pub fn latest_collected<'a, I>(stamps: I) -> Option<DateTime<Utc>>
where
    I: IntoIterator<Item = &'a DateTime<Utc>>,
{
    stamps.into_iter().max().copied()
}
