//! Keyword research service.
//!
//! Glue between the store, the refresh dispatcher and the composite report:
//!
//! 1. normalize the keyword and record the search;
//! 2. replay the cached report unless a refresh is forced;
//! 3. dispatch refreshes for the categories that are due;
//! 4. assemble the report from stored rows, labelling each category with
//!    its freshness and source;
//! 5. cache the report (1h with metrics, 10min without).

use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

use keyword_scout_core::clock::Clock;
use keyword_scout_core::freshness::FreshnessPolicy;
use keyword_scout_core::models::{
    normalize_keyword, source_tags, Category, KeywordRecord, MetricsRecord, RelatedTerm, TagSuggestion, TrendPoint,
};
use keyword_scout_core::report::{
    KeywordAnalysisResponse, MetricsView, RelatedTermsView, TagSuggestionsView, TrendsView,
};
use keyword_scout_core::store::{latest_collected, KeywordStore};

use crate::error::{ResearchError, ResearchResult};
use crate::refresh::{DispatchOutcome, InlineDispatcher, RefreshDispatcher, Refresher};

/// Per-request switches. Excluded categories are neither refreshed nor
/// populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResearchOptions {
    pub include_metrics: bool,
    pub include_trends: bool,
    pub include_related: bool,
    pub include_tags: bool,
    pub force_refresh: bool,
}

impl Default for ResearchOptions {
    fn default() -> Self {
        Self {
            include_metrics: true,
            include_trends: true,
            include_related: true,
            include_tags: true,
            force_refresh: false,
        }
    }
}

impl ResearchOptions {
    pub fn includes(&self, category: Category) -> bool {
        match category {
            Category::Metrics => self.include_metrics,
            Category::Trends => self.include_trends,
            Category::RelatedTerms => self.include_related,
            Category::TagSuggestions => self.include_tags,
        }
    }

    pub fn categories(&self) -> Vec<Category> {
        Category::ALL.into_iter().filter(|c| self.includes(*c)).collect()
    }

    /// Report cache key for `keyword` under these options.
    pub fn cache_key(&self, keyword: &str) -> String {
        let bit = |b: bool| if b { '1' } else { '0' };
        format!(
            "{keyword}|{}{}{}{}",
            bit(self.include_metrics),
            bit(self.include_trends),
            bit(self.include_related),
            bit(self.include_tags)
        )
    }
}

/// Normalize user input, rejecting keywords that are empty after trimming.
pub fn require_keyword(raw: &str) -> ResearchResult<String> {
    normalize_keyword(raw).ok_or_else(|| ResearchError::invalid("keyword must not be empty"))
}

/// Stored rows of every category for one keyword.
struct Snapshot {
    metrics: Option<MetricsRecord>,
    trends: Vec<TrendPoint>,
    related: Vec<RelatedTerm>,
    tags: Vec<TagSuggestion>,
}

pub struct ResearchService {
    store: Arc<dyn KeywordStore>,
    refresher: Arc<Refresher>,
    dispatcher: Arc<dyn RefreshDispatcher>,
    inline: InlineDispatcher,
    policy: FreshnessPolicy,
    clock: Arc<dyn Clock>,
}

impl ResearchService {
    pub fn new(
        refresher: Arc<Refresher>,
        dispatcher: Arc<dyn RefreshDispatcher>,
        policy: FreshnessPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store: refresher.store().clone(),
            inline: InlineDispatcher::new(refresher.clone()),
            refresher,
            dispatcher,
            policy,
            clock,
        }
    }

    pub fn store(&self) -> &Arc<dyn KeywordStore> {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn policy(&self) -> &FreshnessPolicy {
        &self.policy
    }

    /// Research one keyword with the configured dispatch mode.
    pub async fn research(&self, raw: &str, options: ResearchOptions) -> ResearchResult<KeywordAnalysisResponse> {
        let keyword = require_keyword(raw)?;
        self.research_with(&keyword, options, self.dispatcher.as_ref(), true).await
    }

    /// Research an already normalized keyword, awaiting every due refresh.
    ///
    /// Cached reports are never replayed here: a placeholder stored by a
    /// deferred lookup would otherwise hide data this call can collect.
    pub(crate) async fn research_inline(&self, keyword: &str) -> ResearchResult<KeywordAnalysisResponse> {
        self.research_with(keyword, ResearchOptions::default(), &self.inline, false).await
    }

    async fn research_with(
        &self,
        keyword: &str,
        options: ResearchOptions,
        dispatcher: &dyn RefreshDispatcher,
        read_cache: bool,
    ) -> ResearchResult<KeywordAnalysisResponse> {
        let started = self.clock.now();
        self.store
            .record_search(keyword, started)
            .await
            .context("recording search")?;

        let key = options.cache_key(keyword);
        if read_cache && !options.force_refresh {
            if let Some(report) = self.cached_report(&key, started).await? {
                debug!(keyword = %keyword, "serving cached report");
                return Ok(report.served_from_cache());
            }
        }

        let mut due = Vec::new();
        for category in options.categories() {
            if options.force_refresh || self.refresher.is_due(keyword, category).await? {
                due.push(category);
            }
        }
        let outcome = dispatcher.dispatch(keyword, due.clone(), options.force_refresh).await;
        if let DispatchOutcome::Queued(queued) = &outcome {
            if !queued.is_empty() {
                info!(keyword = %keyword, queued = queued.len(), "refresh queued");
            }
        }

        let now = self.clock.now();
        let snapshot = self.snapshot(keyword).await?;
        let report = self.assemble(keyword, &options, &snapshot, outcome.written(), now);

        let ttl = self.policy.report_ttl(report.has_metrics());
        let payload = serde_json::to_string(&report).context("encoding report")?;
        let expires_at = now + chrono::Duration::from_std(ttl).context("report ttl out of range")?;
        self.store
            .put_cached_report(&key, keyword, &payload, expires_at)
            .await
            .context("caching report")?;
        info!(
            keyword = %keyword,
            refreshed = outcome.written().len(),
            ttl_secs = ttl.as_secs(),
            "research complete"
        );
        Ok(report)
    }

    async fn cached_report(&self, key: &str, now: DateTime<Utc>) -> ResearchResult<Option<KeywordAnalysisResponse>> {
        let Some(payload) = self.store.get_cached_report(key, now).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&payload) {
            Ok(report) => Ok(Some(report)),
            Err(e) => {
                warn!(key = %key, error = %e, "discarding unreadable cached report");
                Ok(None)
            }
        }
    }

    async fn snapshot(&self, keyword: &str) -> ResearchResult<Snapshot> {
        let settings = self.refresher.aggregator().settings();
        Ok(Snapshot {
            metrics: self.store.latest_metrics(keyword).await?,
            trends: self.store.trends(keyword, settings.trend_window.points()).await?,
            related: self.store.related_terms(keyword).await?,
            tags: self.store.tag_suggestions(keyword, settings.tag_limit).await?,
        })
    }

    fn assemble(
        &self,
        keyword: &str,
        options: &ResearchOptions,
        snap: &Snapshot,
        written: &[Category],
        now: DateTime<Utc>,
    ) -> KeywordAnalysisResponse {
        let label = |category: Category, collected: Option<DateTime<Utc>>, stored: Option<&str>| {
            if !options.includes(category) {
                return (self.policy.classify(None, now), category.default_source().to_string());
            }
            let source = match stored {
                None => category.default_source().to_string(),
                Some(s) if written.contains(&category) || s == source_tags::FALLBACK => s.to_string(),
                Some(_) => source_tags::CACHE.to_string(),
            };
            (self.policy.classify(collected, now), source)
        };

        let metrics = snap.metrics.as_ref().filter(|_| options.include_metrics);
        let trends: &[TrendPoint] = if options.include_trends { &snap.trends } else { &[] };
        let related: &[RelatedTerm] = if options.include_related { &snap.related } else { &[] };
        let tags: &[TagSuggestion] = if options.include_tags { &snap.tags } else { &[] };

        let (f, s) = label(
            Category::Metrics,
            metrics.map(|m| m.collected_at),
            metrics.map(|m| m.source.as_str()),
        );
        let metrics_view = MetricsView::from_record(metrics, f, s);

        let (f, s) = label(
            Category::Trends,
            latest_collected(trends.iter().map(|p| &p.collected_at)),
            trends.first().map(|p| p.source.as_str()),
        );
        let trends_view = TrendsView::from_points(trends, f, s);

        let (f, s) = label(
            Category::RelatedTerms,
            latest_collected(related.iter().map(|t| &t.collected_at)),
            related.first().map(|t| t.source.as_str()),
        );
        let related_view = RelatedTermsView::from_terms(related, f, s);

        let (f, s) = label(
            Category::TagSuggestions,
            latest_collected(tags.iter().map(|t| &t.collected_at)),
            tag_category_source(tags),
        );
        let tags_view = TagSuggestionsView::from_tags(tags, f, s);

        KeywordAnalysisResponse {
            keyword: keyword.to_string(),
            timestamp: now,
            metrics: metrics_view,
            trends: trends_view,
            related_terms: related_view,
            tag_suggestions: tags_view,
        }
    }

    pub async fn metrics(&self, raw: &str) -> ResearchResult<Option<MetricsRecord>> {
        let keyword = require_keyword(raw)?;
        Ok(self.store.latest_metrics(&keyword).await?)
    }

    pub async fn trends(&self, raw: &str) -> ResearchResult<Option<Vec<TrendPoint>>> {
        let keyword = require_keyword(raw)?;
        let points = self.refresher.aggregator().settings().trend_window.points();
        Ok(non_empty(self.store.trends(&keyword, points).await?))
    }

    pub async fn related(&self, raw: &str) -> ResearchResult<Option<Vec<RelatedTerm>>> {
        let keyword = require_keyword(raw)?;
        Ok(non_empty(self.store.related_terms(&keyword).await?))
    }

    pub async fn tags(&self, raw: &str) -> ResearchResult<Option<Vec<TagSuggestion>>> {
        let keyword = require_keyword(raw)?;
        let limit = self.refresher.aggregator().settings().tag_limit;
        Ok(non_empty(self.store.tag_suggestions(&keyword, limit).await?))
    }

    pub async fn history(&self, prefix: Option<&str>, limit: usize) -> ResearchResult<Vec<KeywordRecord>> {
        let prefix = prefix.and_then(normalize_keyword);
        Ok(self.store.list_keywords(prefix.as_deref(), limit).await?)
    }

    /// Clear one keyword's history and data, or everything. Returns history rows removed.
    pub async fn clear_history(&self, raw: Option<&str>) -> ResearchResult<u64> {
        let keyword = raw.map(require_keyword).transpose()?;
        let removed = self.store.clear_history(keyword.as_deref()).await?;
        info!(keyword = keyword.as_deref().unwrap_or("*"), removed, "history cleared");
        Ok(removed)
    }

    pub async fn clear_cache(&self) -> ResearchResult<u64> {
        let removed = self.store.clear_reports(None).await?;
        info!(removed, "report cache cleared");
        Ok(removed)
    }
}

fn non_empty<T>(rows: Vec<T>) -> Option<Vec<T>> {
    if rows.is_empty() {
        None
    } else {
        Some(rows)
    }
}

/// Category source of a tag set: the harvesting source when any tag came
/// from page text, otherwise keyword analysis.
fn tag_category_source(tags: &[TagSuggestion]) -> Option<&str> {
    if tags.is_empty() {
        return None;
    }
    Some(
        tags.iter()
            .map(|t| t.source.as_str())
            .find(|s| *s != source_tags::KEYWORD_ANALYSIS)
            .unwrap_or(source_tags::KEYWORD_ANALYSIS),
    )
}
