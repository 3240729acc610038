//! TOML configuration.
//!
//! Every section except `[db]` and `[server]` is optional and falls back
//! to documented defaults. [`load_config`] parses and validates in one step;
//! credential environment overrides are applied later by
//! [`CredentialStore::load`](crate::credentials::CredentialStore::load).

use anyhow::{Context, Result};
use keyword_scout_core::freshness::FreshnessPolicy;
use keyword_scout_core::providers::TrendWindow;
use keyword_scout_core::related::MAX_RELATED_TERMS;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub freshness: FreshnessConfig,
    #[serde(default)]
    pub research: ResearchConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FreshnessConfig {
    #[serde(default = "default_fresh_hours")]
    pub fresh_hours: i64,
    #[serde(default = "default_refresh_hours")]
    pub refresh_hours: i64,
    #[serde(default = "default_report_ttl_secs")]
    pub report_ttl_secs: u64,
    #[serde(default = "default_pending_report_ttl_secs")]
    pub pending_report_ttl_secs: u64,
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        Self {
            fresh_hours: default_fresh_hours(),
            refresh_hours: default_refresh_hours(),
            report_ttl_secs: default_report_ttl_secs(),
            pending_report_ttl_secs: default_pending_report_ttl_secs(),
        }
    }
}

fn default_fresh_hours() -> i64 {
    6
}
fn default_refresh_hours() -> i64 {
    24
}
fn default_report_ttl_secs() -> u64 {
    3600
}
fn default_pending_report_ttl_secs() -> u64 {
    600
}

impl FreshnessConfig {
    pub fn policy(&self) -> FreshnessPolicy {
        FreshnessPolicy {
            fresh_for: chrono::Duration::hours(self.fresh_hours),
            refresh_after: chrono::Duration::hours(self.refresh_hours),
            report_ttl: Duration::from_secs(self.report_ttl_secs),
            pending_report_ttl: Duration::from_secs(self.pending_report_ttl_secs),
        }
    }
}

/// How category refreshes are executed.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Refresh before responding.
    Inline,
    /// Queue refreshes on a background worker and respond immediately.
    Deferred,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ResearchConfig {
    #[serde(default = "default_mode")]
    pub mode: DispatchMode,
    #[serde(default = "default_trend_window")]
    pub trend_window: TrendWindow,
    #[serde(default = "default_related_limit")]
    pub related_limit: usize,
    #[serde(default = "default_tag_limit")]
    pub tag_limit: usize,
    #[serde(default = "default_bulk_max")]
    pub bulk_max: usize,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            trend_window: default_trend_window(),
            related_limit: default_related_limit(),
            tag_limit: default_tag_limit(),
            bulk_max: default_bulk_max(),
        }
    }
}

fn default_mode() -> DispatchMode {
    DispatchMode::Inline
}
fn default_trend_window() -> TrendWindow {
    TrendWindow::Monthly
}
fn default_related_limit() -> usize {
    MAX_RELATED_TERMS
}
fn default_tag_limit() -> usize {
    keyword_scout_core::tags::MAX_TAGS
}
fn default_bulk_max() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourcesConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_autocomplete_timeout_secs")]
    pub autocomplete_timeout_secs: u64,
    #[serde(default = "default_openapi_url")]
    pub openapi_url: String,
    #[serde(default = "default_autocomplete_url")]
    pub autocomplete_url: String,
    #[serde(default = "default_search_url")]
    pub search_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            autocomplete_timeout_secs: default_autocomplete_timeout_secs(),
            openapi_url: default_openapi_url(),
            autocomplete_url: default_autocomplete_url(),
            search_url: default_search_url(),
            user_agent: default_user_agent(),
        }
    }
}

impl SourcesConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn autocomplete_timeout(&self) -> Duration {
        Duration::from_secs(self.autocomplete_timeout_secs)
    }
}

fn default_timeout_secs() -> u64 {
    10
}
fn default_autocomplete_timeout_secs() -> u64 {
    5
}
fn default_openapi_url() -> String {
    "https://openapi.naver.com".to_string()
}
fn default_autocomplete_url() -> String {
    "https://ac.search.naver.com/nx/ac".to_string()
}
fn default_search_url() -> String {
    "https://search.naver.com/search.naver".to_string()
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36".to_string()
}

/// Vendor credentials from the config file. All optional.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct CredentialsConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub customer_id: Option<String>,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    let f = &config.freshness;
    if f.fresh_hours <= 0 {
        anyhow::bail!("freshness.fresh_hours must be > 0");
    }
    if f.refresh_hours < f.fresh_hours {
        anyhow::bail!("freshness.refresh_hours must be >= freshness.fresh_hours");
    }
    if f.report_ttl_secs == 0 || f.pending_report_ttl_secs == 0 {
        anyhow::bail!("freshness report TTLs must be > 0");
    }

    let r = &config.research;
    if !(1..=MAX_RELATED_TERMS).contains(&r.related_limit) {
        anyhow::bail!("research.related_limit must be in [1, {}]", MAX_RELATED_TERMS);
    }
    if r.tag_limit == 0 {
        anyhow::bail!("research.tag_limit must be > 0");
    }
    if !(1..=100).contains(&r.bulk_max) {
        anyhow::bail!("research.bulk_max must be in [1, 100]");
    }

    let s = &config.sources;
    if s.timeout_secs == 0 || s.autocomplete_timeout_secs == 0 {
        anyhow::bail!("sources timeouts must be > 0");
    }

    Ok(())
}
