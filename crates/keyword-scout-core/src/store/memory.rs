//! In-memory [`KeywordStore`] implementation for tests and ephemeral runs.
//!
//! One `HashMap` per table behind `std::sync::RwLock`, keyed by the same
//! natural keys the SQLite schema uses.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{KeywordRecord, MetricsRecord, RelatedTerm, TagSuggestion, TrendPoint};

use super::KeywordStore;

type Pair = (String, String);

struct CachedReport {
    keyword: String,
    payload: String,
    expires_at: DateTime<Utc>,
}

/// In-memory store for tests and ephemeral runs.
pub struct InMemoryStore {
    keywords: RwLock<HashMap<String, KeywordRecord>>,
    metrics: RwLock<HashMap<Pair, MetricsRecord>>,
    trends: RwLock<HashMap<Pair, TrendPoint>>,
    related: RwLock<HashMap<Pair, RelatedTerm>>,
    tags: RwLock<HashMap<Pair, TagSuggestion>>,
    reports: RwLock<HashMap<String, CachedReport>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            keywords: RwLock::new(HashMap::new()),
            metrics: RwLock::new(HashMap::new()),
            trends: RwLock::new(HashMap::new()),
            related: RwLock::new(HashMap::new()),
            tags: RwLock::new(HashMap::new()),
            reports: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

fn key(a: &str, b: &str) -> Pair {
    (a.to_string(), b.to_string())
}

#[async_trait]
impl KeywordStore for InMemoryStore {
    async fn record_search(&self, keyword: &str, at: DateTime<Utc>) -> Result<KeywordRecord> {
        let mut keywords = write(&self.keywords)?;
        let record = keywords
            .entry(keyword.to_string())
            .and_modify(|r| {
                r.last_searched_at = at;
                r.search_count += 1;
            })
            .or_insert_with(|| KeywordRecord {
                keyword: keyword.to_string(),
                first_searched_at: at,
                last_searched_at: at,
                search_count: 1,
            });
        Ok(record.clone())
    }

    async fn get_keyword(&self, keyword: &str) -> Result<Option<KeywordRecord>> {
        Ok(read(&self.keywords)?.get(keyword).cloned())
    }

    async fn list_keywords(&self, prefix: Option<&str>, limit: usize) -> Result<Vec<KeywordRecord>> {
        let keywords = read(&self.keywords)?;
        let mut rows: Vec<KeywordRecord> = keywords
            .values()
            .filter(|r| prefix.map_or(true, |p| r.keyword.starts_with(p)))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.last_searched_at
                .cmp(&a.last_searched_at)
                .then_with(|| a.keyword.cmp(&b.keyword))
        });
        rows.truncate(limit);
        Ok(rows)
    }

    async fn upsert_metrics(&self, record: &MetricsRecord) -> Result<()> {
        write(&self.metrics)?.insert(key(&record.keyword, &record.period), record.clone());
        Ok(())
    }

    async fn latest_metrics(&self, keyword: &str) -> Result<Option<MetricsRecord>> {
        let metrics = read(&self.metrics)?;
        Ok(metrics
            .values()
            .filter(|m| m.keyword == keyword)
            .max_by(|a, b| {
                a.period
                    .cmp(&b.period)
                    .then_with(|| a.collected_at.cmp(&b.collected_at))
            })
            .cloned())
    }

    async fn upsert_trends(&self, points: &[TrendPoint]) -> Result<()> {
        let mut trends = write(&self.trends)?;
        for p in points {
            trends.insert(key(&p.keyword, &p.date), p.clone());
        }
        Ok(())
    }

    async fn trends(&self, keyword: &str, limit: usize) -> Result<Vec<TrendPoint>> {
        let trends = read(&self.trends)?;
        let mut points: Vec<TrendPoint> = trends
            .values()
            .filter(|p| p.keyword == keyword)
            .cloned()
            .collect();
        points.sort_by(|a, b| b.date.cmp(&a.date));
        points.truncate(limit);
        points.reverse();
        Ok(points)
    }

    async fn replace_related_terms(&self, root: &str, terms: &[RelatedTerm]) -> Result<()> {
        let mut related = write(&self.related)?;
        related.retain(|(r, _), _| r != root);
        for t in terms {
            related.insert(key(root, &t.term), t.clone());
        }
        Ok(())
    }

    async fn related_terms(&self, root: &str) -> Result<Vec<RelatedTerm>> {
        let related = read(&self.related)?;
        let mut terms: Vec<RelatedTerm> = related
            .values()
            .filter(|t| t.root_keyword == root)
            .cloned()
            .collect();
        terms.sort_by(|a, b| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.term.cmp(&b.term))
        });
        Ok(terms)
    }

    async fn upsert_tags(&self, tags: &[TagSuggestion]) -> Result<()> {
        let mut stored = write(&self.tags)?;
        for t in tags {
            stored
                .entry(key(&t.root_keyword, &t.tag))
                .and_modify(|existing| {
                    existing.frequency += t.frequency;
                    existing.category = t.category.clone();
                    existing.source = t.source.clone();
                    existing.collected_at = t.collected_at;
                })
                .or_insert_with(|| t.clone());
        }
        Ok(())
    }

    async fn tag_suggestions(&self, root: &str, limit: usize) -> Result<Vec<TagSuggestion>> {
        let stored = read(&self.tags)?;
        let mut tags: Vec<TagSuggestion> = stored
            .values()
            .filter(|t| t.root_keyword == root)
            .cloned()
            .collect();
        tags.sort_by(|a, b| b.frequency.cmp(&a.frequency).then_with(|| a.tag.cmp(&b.tag)));
        tags.truncate(limit);
        Ok(tags)
    }

    async fn get_cached_report(&self, key: &str, now: DateTime<Utc>) -> Result<Option<String>> {
        let reports = read(&self.reports)?;
        Ok(reports
            .get(key)
            .filter(|r| r.expires_at > now)
            .map(|r| r.payload.clone()))
    }

    async fn put_cached_report(
        &self,
        key: &str,
        keyword: &str,
        payload: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        write(&self.reports)?.insert(
            key.to_string(),
            CachedReport {
                keyword: keyword.to_string(),
                payload: payload.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn clear_reports(&self, keyword: Option<&str>) -> Result<u64> {
        let mut reports = write(&self.reports)?;
        let before = reports.len();
        match keyword {
            Some(k) => reports.retain(|_, r| r.keyword != k),
            None => reports.clear(),
        }
        Ok((before - reports.len()) as u64)
    }

    async fn clear_history(&self, keyword: Option<&str>) -> Result<u64> {
        let removed = {
            let mut keywords = write(&self.keywords)?;
            let before = keywords.len();
            match keyword {
                Some(k) => {
                    keywords.remove(k);
                }
                None => keywords.clear(),
            }
            (before - keywords.len()) as u64
        };

        let matches = |k: &str| keyword.map_or(true, |target| k == target);
        write(&self.metrics)?.retain(|(k, _), _| !matches(k));
        write(&self.trends)?.retain(|(k, _), _| !matches(k));
        write(&self.related)?.retain(|(k, _), _| !matches(k));
        write(&self.tags)?.retain(|(k, _), _| !matches(k));
        self.clear_reports(keyword).await?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CompetitionLevel;
    use chrono::Duration;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn tag(root: &str, tag: &str, frequency: i64) -> TagSuggestion {
        TagSuggestion {
            root_keyword: root.into(),
            tag: tag.into(),
            frequency,
            category: None,
            source: "blog-crawling".into(),
            collected_at: t0(),
        }
    }

    fn point(keyword: &str, date: &str, value: i64) -> TrendPoint {
        TrendPoint {
            keyword: keyword.into(),
            date: date.into(),
            value,
            source: "naver-datalab".into(),
            collected_at: t0(),
        }
    }

    #[tokio::test]
    async fn test_record_search_counts() {
        let store = InMemoryStore::new();
        store.record_search("rust", t0()).await.unwrap();
        let r = store
            .record_search("rust", t0() + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(r.search_count, 2);
        assert_eq!(r.first_searched_at, t0());
        assert_eq!(r.last_searched_at, t0() + Duration::hours(1));
    }

    #[tokio::test]
    async fn test_list_keywords_prefix_newest_first() {
        let store = InMemoryStore::new();
        store.record_search("rust web", t0()).await.unwrap();
        store
            .record_search("rust book", t0() + Duration::minutes(5))
            .await
            .unwrap();
        store
            .record_search("python", t0() + Duration::minutes(10))
            .await
            .unwrap();

        let rows = store.list_keywords(Some("rust"), 10).await.unwrap();
        let names: Vec<_> = rows.iter().map(|r| r.keyword.as_str()).collect();
        assert_eq!(names, vec!["rust book", "rust web"]);
        assert_eq!(store.list_keywords(None, 1).await.unwrap()[0].keyword, "python");
    }

    #[tokio::test]
    async fn test_latest_metrics_prefers_latest_period() {
        let store = InMemoryStore::new();
        for period in ["2024-01", "2024-03", "2024-02"] {
            store
                .upsert_metrics(&MetricsRecord {
                    keyword: "rust".into(),
                    period: period.into(),
                    search_volume: Some(10),
                    competition_level: Some(CompetitionLevel::Low),
                    competition_index: Some(0.1),
                    document_count: None,
                    source: "fallback".into(),
                    collected_at: t0(),
                })
                .await
                .unwrap();
        }
        let latest = store.latest_metrics("rust").await.unwrap().unwrap();
        assert_eq!(latest.period, "2024-03");
        assert!(store.latest_metrics("go").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_trends_window_oldest_first() {
        let store = InMemoryStore::new();
        let points: Vec<_> = (1..=5)
            .map(|d| point("rust", &format!("2024-01-0{}", d), d))
            .collect();
        store.upsert_trends(&points).await.unwrap();
        store.upsert_trends(&[point("rust", "2024-01-05", 50)]).await.unwrap();

        let window = store.trends("rust", 3).await.unwrap();
        let dates: Vec<_> = window.iter().map(|p| p.date.as_str()).collect();
        assert_eq!(dates, vec!["2024-01-03", "2024-01-04", "2024-01-05"]);
        assert_eq!(window[2].value, 50);
    }

    #[tokio::test]
    async fn test_tag_frequency_accumulates() {
        let store = InMemoryStore::new();
        store
            .upsert_tags(&[tag("rust", "cargo", 2), tag("rust", "crate", 1)])
            .await
            .unwrap();
        store.upsert_tags(&[tag("rust", "crate", 3)]).await.unwrap();
        let tags = store.tag_suggestions("rust", 10).await.unwrap();
        assert_eq!(tags[0].tag, "crate");
        assert_eq!(tags[0].frequency, 4);
        assert_eq!(tags[1].frequency, 2);
    }

    #[tokio::test]
    async fn test_report_cache_expiry() {
        let store = InMemoryStore::new();
        store
            .put_cached_report("k", "rust", "{}", t0() + Duration::minutes(10))
            .await
            .unwrap();
        assert!(store.get_cached_report("k", t0()).await.unwrap().is_some());
        assert!(store
            .get_cached_report("k", t0() + Duration::minutes(10))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_clear_history_single_keyword() {
        let store = InMemoryStore::new();
        store.record_search("rust", t0()).await.unwrap();
        store.record_search("go", t0()).await.unwrap();
        store.upsert_tags(&[tag("rust", "cargo", 1), tag("go", "gopher", 1)]).await.unwrap();
        store
            .put_cached_report("rust|all", "rust", "{}", t0() + Duration::hours(1))
            .await
            .unwrap();

        assert_eq!(store.clear_history(Some("rust")).await.unwrap(), 1);
        assert!(store.get_keyword("rust").await.unwrap().is_none());
        assert!(store.tag_suggestions("rust", 10).await.unwrap().is_empty());
        assert_eq!(store.tag_suggestions("go", 10).await.unwrap().len(), 1);
        assert!(store.get_cached_report("rust|all", t0()).await.unwrap().is_none());

        assert_eq!(store.clear_history(None).await.unwrap(), 1);
        assert!(store.list_keywords(None, 10).await.unwrap().is_empty());
    }
}
