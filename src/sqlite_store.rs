//! SQLite-backed [`KeywordStore`] implementation.
//!
//! Every write is a single `INSERT ... ON CONFLICT DO UPDATE` on the table's
//! natural key, so concurrent writers for the same key resolve to last
//! writer wins without lost rows. Related-term replacement runs in one
//! transaction.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use keyword_scout_core::models::{
    CompetitionLevel, KeywordRecord, MetricsRecord, RelatedTerm, TagSuggestion, TrendPoint,
};
use keyword_scout_core::store::KeywordStore;

/// SQLite implementation of the [`KeywordStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn from_ts(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_default()
}

/// Escape `LIKE` wildcards so a prefix matches literally.
fn like_prefix(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn keyword_row(row: &SqliteRow) -> KeywordRecord {
    KeywordRecord {
        keyword: row.get("keyword"),
        first_searched_at: from_ts(row.get("first_searched_at")),
        last_searched_at: from_ts(row.get("last_searched_at")),
        search_count: row.get("search_count"),
    }
}

fn metrics_row(row: &SqliteRow) -> MetricsRecord {
    let level: Option<String> = row.get("competition_level");
    MetricsRecord {
        keyword: row.get("keyword"),
        period: row.get("period"),
        search_volume: row.get("search_volume"),
        competition_level: level.as_deref().and_then(CompetitionLevel::parse),
        competition_index: row.get("competition_index"),
        document_count: row.get("document_count"),
        source: row.get("source"),
        collected_at: from_ts(row.get("collected_at")),
    }
}

fn trend_row(row: &SqliteRow) -> TrendPoint {
    TrendPoint {
        keyword: row.get("keyword"),
        date: row.get("date"),
        value: row.get("value"),
        source: row.get("source"),
        collected_at: from_ts(row.get("collected_at")),
    }
}

fn related_row(row: &SqliteRow) -> RelatedTerm {
    RelatedTerm {
        root_keyword: row.get("root_keyword"),
        term: row.get("term"),
        relevance: row.get("relevance"),
        search_volume: row.get("search_volume"),
        source: row.get("source"),
        collected_at: from_ts(row.get("collected_at")),
    }
}

fn tag_row(row: &SqliteRow) -> TagSuggestion {
    TagSuggestion {
        root_keyword: row.get("root_keyword"),
        tag: row.get("tag"),
        frequency: row.get("frequency"),
        category: row.get("category"),
        source: row.get("source"),
        collected_at: from_ts(row.get("collected_at")),
    }
}

#[async_trait]
impl KeywordStore for SqliteStore {
    async fn record_search(&self, keyword: &str, at: DateTime<Utc>) -> Result<KeywordRecord> {
        let row = sqlx::query(
            r#"
            INSERT INTO keywords (keyword, first_searched_at, last_searched_at, search_count)
            VALUES (?, ?, ?, 1)
            ON CONFLICT(keyword) DO UPDATE SET
                last_searched_at = excluded.last_searched_at,
                search_count = keywords.search_count + 1
            RETURNING keyword, first_searched_at, last_searched_at, search_count
            "#,
        )
        .bind(keyword)
        .bind(at.timestamp())
        .bind(at.timestamp())
        .fetch_one(&self.pool)
        .await
        .context("Failed to record search")?;
        Ok(keyword_row(&row))
    }

    async fn get_keyword(&self, keyword: &str) -> Result<Option<KeywordRecord>> {
        let row = sqlx::query(
            "SELECT keyword, first_searched_at, last_searched_at, search_count FROM keywords WHERE keyword = ?",
        )
        .bind(keyword)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(keyword_row))
    }

    async fn list_keywords(&self, prefix: Option<&str>, limit: usize) -> Result<Vec<KeywordRecord>> {
        let rows = match prefix {
            Some(p) => {
                sqlx::query(
                    r#"
                    SELECT keyword, first_searched_at, last_searched_at, search_count
                    FROM keywords
                    WHERE keyword LIKE ? ESCAPE '\'
                    ORDER BY last_searched_at DESC, keyword ASC
                    LIMIT ?
                    "#,
                )
                .bind(like_prefix(p))
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT keyword, first_searched_at, last_searched_at, search_count
                    FROM keywords
                    ORDER BY last_searched_at DESC, keyword ASC
                    LIMIT ?
                    "#,
                )
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows.iter().map(keyword_row).collect())
    }

    async fn upsert_metrics(&self, record: &MetricsRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO keyword_metrics (keyword, period, search_volume, competition_level,
                                         competition_index, document_count, source, collected_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(keyword, period) DO UPDATE SET
                search_volume = excluded.search_volume,
                competition_level = excluded.competition_level,
                competition_index = excluded.competition_index,
                document_count = excluded.document_count,
                source = excluded.source,
                collected_at = excluded.collected_at
            "#,
        )
        .bind(&record.keyword)
        .bind(&record.period)
        .bind(record.search_volume)
        .bind(record.competition_level.map(|l| l.as_str()))
        .bind(record.competition_index)
        .bind(record.document_count)
        .bind(&record.source)
        .bind(record.collected_at.timestamp())
        .execute(&self.pool)
        .await
        .context("Failed to upsert metrics")?;
        Ok(())
    }

    async fn latest_metrics(&self, keyword: &str) -> Result<Option<MetricsRecord>> {
        let row = sqlx::query(
            r#"
            SELECT keyword, period, search_volume, competition_level, competition_index,
                   document_count, source, collected_at
            FROM keyword_metrics
            WHERE keyword = ?
            ORDER BY period DESC, collected_at DESC
            LIMIT 1
            "#,
        )
        .bind(keyword)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(metrics_row))
    }

    async fn upsert_trends(&self, points: &[TrendPoint]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for p in points {
            sqlx::query(
                r#"
                INSERT INTO keyword_trends (keyword, date, value, source, collected_at)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(keyword, date) DO UPDATE SET
                    value = excluded.value,
                    source = excluded.source,
                    collected_at = excluded.collected_at
                "#,
            )
            .bind(&p.keyword)
            .bind(&p.date)
            .bind(p.value)
            .bind(&p.source)
            .bind(p.collected_at.timestamp())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await.context("Failed to upsert trends")?;
        Ok(())
    }

    async fn trends(&self, keyword: &str, limit: usize) -> Result<Vec<TrendPoint>> {
        let rows = sqlx::query(
            r#"
            SELECT keyword, date, value, source, collected_at FROM (
                SELECT keyword, date, value, source, collected_at
                FROM keyword_trends
                WHERE keyword = ?
                ORDER BY date DESC
                LIMIT ?
            ) ORDER BY date ASC
            "#,
        )
        .bind(keyword)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(trend_row).collect())
    }

    async fn replace_related_terms(&self, root: &str, terms: &[RelatedTerm]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM related_terms WHERE root_keyword = ?")
            .bind(root)
            .execute(&mut *tx)
            .await?;
        for t in terms {
            sqlx::query(
                r#"
                INSERT INTO related_terms (root_keyword, term, relevance, search_volume, source, collected_at)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(root_keyword, term) DO UPDATE SET
                    relevance = excluded.relevance,
                    search_volume = excluded.search_volume,
                    source = excluded.source,
                    collected_at = excluded.collected_at
                "#,
            )
            .bind(root)
            .bind(&t.term)
            .bind(t.relevance)
            .bind(t.search_volume)
            .bind(&t.source)
            .bind(t.collected_at.timestamp())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await.context("Failed to replace related terms")?;
        Ok(())
    }

    async fn related_terms(&self, root: &str) -> Result<Vec<RelatedTerm>> {
        let rows = sqlx::query(
            r#"
            SELECT root_keyword, term, relevance, search_volume, source, collected_at
            FROM related_terms
            WHERE root_keyword = ?
            ORDER BY relevance DESC, term ASC
            "#,
        )
        .bind(root)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(related_row).collect())
    }

    async fn upsert_tags(&self, tags: &[TagSuggestion]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for t in tags {
            sqlx::query(
                r#"
                INSERT INTO tag_suggestions (root_keyword, tag, frequency, category, source, collected_at)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(root_keyword, tag) DO UPDATE SET
                    frequency = tag_suggestions.frequency + excluded.frequency,
                    category = excluded.category,
                    source = excluded.source,
                    collected_at = excluded.collected_at
                "#,
            )
            .bind(&t.root_keyword)
            .bind(&t.tag)
            .bind(t.frequency)
            .bind(&t.category)
            .bind(&t.source)
            .bind(t.collected_at.timestamp())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await.context("Failed to upsert tags")?;
        Ok(())
    }

    async fn tag_suggestions(&self, root: &str, limit: usize) -> Result<Vec<TagSuggestion>> {
        let rows = sqlx::query(
            r#"
            SELECT root_keyword, tag, frequency, category, source, collected_at
            FROM tag_suggestions
            WHERE root_keyword = ?
            ORDER BY frequency DESC, tag ASC
            LIMIT ?
            "#,
        )
        .bind(root)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(tag_row).collect())
    }

    async fn get_cached_report(&self, key: &str, now: DateTime<Utc>) -> Result<Option<String>> {
        let payload: Option<String> =
            sqlx::query_scalar("SELECT payload FROM report_cache WHERE key = ? AND expires_at > ?")
                .bind(key)
                .bind(now.timestamp())
                .fetch_optional(&self.pool)
                .await?;
        Ok(payload)
    }

    async fn put_cached_report(
        &self,
        key: &str,
        keyword: &str,
        payload: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO report_cache (key, keyword, payload, expires_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                keyword = excluded.keyword,
                payload = excluded.payload,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(key)
        .bind(keyword)
        .bind(payload)
        .bind(expires_at.timestamp())
        .execute(&self.pool)
        .await
        .context("Failed to write report cache")?;
        Ok(())
    }

    async fn clear_reports(&self, keyword: Option<&str>) -> Result<u64> {
        let result = match keyword {
            Some(k) => {
                sqlx::query("DELETE FROM report_cache WHERE keyword = ?")
                    .bind(k)
                    .execute(&self.pool)
                    .await?
            }
            None => sqlx::query("DELETE FROM report_cache").execute(&self.pool).await?,
        };
        Ok(result.rows_affected())
    }

    async fn clear_history(&self, keyword: Option<&str>) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let removed = match keyword {
            Some(k) => {
                let removed = sqlx::query("DELETE FROM keywords WHERE keyword = ?")
                    .bind(k)
                    .execute(&mut *tx)
                    .await?
                    .rows_affected();
                for statement in [
                    "DELETE FROM keyword_metrics WHERE keyword = ?",
                    "DELETE FROM keyword_trends WHERE keyword = ?",
                    "DELETE FROM related_terms WHERE root_keyword = ?",
                    "DELETE FROM tag_suggestions WHERE root_keyword = ?",
                    "DELETE FROM report_cache WHERE keyword = ?",
                ] {
                    sqlx::query(statement).bind(k).execute(&mut *tx).await?;
                }
                removed
            }
            None => {
                let removed = sqlx::query("DELETE FROM keywords")
                    .execute(&mut *tx)
                    .await?
                    .rows_affected();
                for table in [
                    "keyword_metrics",
                    "keyword_trends",
                    "related_terms",
                    "tag_suggestions",
                    "report_cache",
                ] {
                    sqlx::query(&format!("DELETE FROM {table}"))
                        .execute(&mut *tx)
                        .await?;
                }
                removed
            }
        };
        tx.commit().await.context("Failed to clear history")?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    async fn store() -> (TempDir, SqliteStore) {
        let dir = TempDir::new().unwrap();
        let pool = crate::db::connect_path(&dir.path().join("test.sqlite"))
            .await
            .unwrap();
        crate::migrate::apply(&pool).await.unwrap();
        (dir, SqliteStore::new(pool))
    }

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_like_prefix_escapes_wildcards() {
        assert_eq!(like_prefix("50%_off"), "50\\%\\_off%");
        assert_eq!(like_prefix("rust"), "rust%");
    }

    #[tokio::test]
    async fn test_record_search_and_history() {
        let (_dir, store) = store().await;
        store.record_search("rust web", t0()).await.unwrap();
        let r = store
            .record_search("rust web", t0() + Duration::hours(2))
            .await
            .unwrap();
        assert_eq!(r.search_count, 2);
        assert_eq!(r.first_searched_at, t0());

        store.record_search("r_st", t0()).await.unwrap();
        let rows = store.list_keywords(Some("r_"), 10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].keyword, "r_st");
    }

    #[tokio::test]
    async fn test_metrics_round_trip_and_overwrite() {
        let (_dir, store) = store().await;
        let mut record = MetricsRecord {
            keyword: "rust".into(),
            period: "2024-03".into(),
            search_volume: Some(1200),
            competition_level: Some(CompetitionLevel::Medium),
            competition_index: Some(0.42),
            document_count: Some(30_000),
            source: "naver-search-api".into(),
            collected_at: t0(),
        };
        store.upsert_metrics(&record).await.unwrap();
        assert_eq!(store.latest_metrics("rust").await.unwrap(), Some(record.clone()));

        record.search_volume = Some(1300);
        store.upsert_metrics(&record).await.unwrap();
        let latest = store.latest_metrics("rust").await.unwrap().unwrap();
        assert_eq!(latest.search_volume, Some(1300));
    }

    #[tokio::test]
    async fn test_tags_accumulate_and_clear() {
        let (_dir, store) = store().await;
        let tag = TagSuggestion {
            root_keyword: "rust".into(),
            tag: "cargo".into(),
            frequency: 2,
            category: Some("primary".into()),
            source: "blog-crawling".into(),
            collected_at: t0(),
        };
        store.upsert_tags(&[tag.clone()]).await.unwrap();
        store.upsert_tags(&[tag]).await.unwrap();
        let tags = store.tag_suggestions("rust", 10).await.unwrap();
        assert_eq!(tags[0].frequency, 4);

        store.record_search("rust", t0()).await.unwrap();
        store
            .put_cached_report("rust|mtrg", "rust", "{}", t0() + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(store.clear_history(Some("rust")).await.unwrap(), 1);
        assert!(store.tag_suggestions("rust", 10).await.unwrap().is_empty());
        assert!(store.get_cached_report("rust|mtrg", t0()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_related_terms_replace() {
        let (_dir, store) = store().await;
        let term = |t: &str, relevance: f64| RelatedTerm {
            root_keyword: "rust".into(),
            term: t.into(),
            relevance,
            search_volume: None,
            source: "naver-autocomplete".into(),
            collected_at: t0(),
        };
        store
            .replace_related_terms("rust", &[term("rust book", 1.0), term("rust web", 0.5)])
            .await
            .unwrap();
        store
            .replace_related_terms("rust", &[term("rust async", 1.0)])
            .await
            .unwrap();
        let terms = store.related_terms("rust").await.unwrap();
        assert_eq!(terms.len(), 1);
        assert_eq!(terms[0].term, "rust async");
    }
}
