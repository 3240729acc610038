//! Idempotent schema migrations.
//!
//! Every statement is `CREATE ... IF NOT EXISTS`, so `kscout init` can run
//! any number of times. Timestamps are stored as Unix seconds.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS keywords (
        keyword TEXT PRIMARY KEY,
        first_searched_at INTEGER NOT NULL,
        last_searched_at INTEGER NOT NULL,
        search_count INTEGER NOT NULL DEFAULT 1
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS keyword_metrics (
        keyword TEXT NOT NULL,
        period TEXT NOT NULL,
        search_volume INTEGER,
        competition_level TEXT,
        competition_index REAL,
        document_count INTEGER,
        source TEXT NOT NULL,
        collected_at INTEGER NOT NULL,
        UNIQUE(keyword, period)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS keyword_trends (
        keyword TEXT NOT NULL,
        date TEXT NOT NULL,
        value INTEGER NOT NULL,
        source TEXT NOT NULL,
        collected_at INTEGER NOT NULL,
        UNIQUE(keyword, date)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS related_terms (
        root_keyword TEXT NOT NULL,
        term TEXT NOT NULL,
        relevance REAL NOT NULL,
        search_volume INTEGER,
        source TEXT NOT NULL,
        collected_at INTEGER NOT NULL,
        UNIQUE(root_keyword, term)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tag_suggestions (
        root_keyword TEXT NOT NULL,
        tag TEXT NOT NULL,
        frequency INTEGER NOT NULL DEFAULT 1,
        category TEXT,
        source TEXT NOT NULL,
        collected_at INTEGER NOT NULL,
        UNIQUE(root_keyword, tag)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS report_cache (
        key TEXT PRIMARY KEY,
        keyword TEXT NOT NULL,
        payload TEXT NOT NULL,
        expires_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_keywords_last_searched ON keywords(last_searched_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_trends_keyword_date ON keyword_trends(keyword, date DESC)",
    "CREATE INDEX IF NOT EXISTS idx_report_cache_keyword ON report_cache(keyword)",
];

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create every table and index on an open pool.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
