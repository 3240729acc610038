//! Category refresh and dispatch.
//!
//! A [`Refresher`] re-fetches one (keyword, category) pair and writes the
//! result to the store. Refreshes of the same pair are serialized through a
//! per-key async mutex, and the refresh-due check is repeated under that
//! lock, so overlapping requests do at most one fetch.
//!
//! A [`RefreshDispatcher`] decides *when* refreshes run:
//! [`InlineDispatcher`] awaits them before returning, [`QueuedDispatcher`]
//! hands them to a background worker and returns at once. Both write the
//! same records.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, warn};

use keyword_scout_core::clock::Clock;
use keyword_scout_core::freshness::FreshnessPolicy;
use keyword_scout_core::models::{period_of, Category, MetricsRecord, RelatedTerm, TagSuggestion, TrendPoint};
use keyword_scout_core::store::{latest_collected, KeywordStore};

use crate::aggregate::Aggregator;

type LockKey = (String, Category);

/// One async mutex per (keyword, category), dropped when no longer held.
#[derive(Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<LockKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyedLocks {
    fn handle(&self, key: &LockKey) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        map.entry(key.clone()).or_default().clone()
    }

    fn release(&self, key: &LockKey) {
        let mut map = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if map.get(key).is_some_and(|m| Arc::strong_count(m) == 1) {
            map.remove(key);
        }
    }

    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct Refresher {
    store: Arc<dyn KeywordStore>,
    aggregator: Arc<Aggregator>,
    policy: FreshnessPolicy,
    clock: Arc<dyn Clock>,
    locks: KeyedLocks,
}

impl Refresher {
    pub fn new(
        store: Arc<dyn KeywordStore>,
        aggregator: Arc<Aggregator>,
        policy: FreshnessPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            aggregator,
            policy,
            clock,
            locks: KeyedLocks::default(),
        }
    }

    pub fn store(&self) -> &Arc<dyn KeywordStore> {
        &self.store
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    /// Latest `collected_at` stored for a category.
    pub async fn collected_at(&self, keyword: &str, category: Category) -> Result<Option<DateTime<Utc>>> {
        Ok(match category {
            Category::Metrics => self.store.latest_metrics(keyword).await?.map(|m| m.collected_at),
            Category::Trends => {
                let points = self
                    .store
                    .trends(keyword, self.aggregator.settings().trend_window.points())
                    .await?;
                latest_collected(points.iter().map(|p| &p.collected_at))
            }
            Category::RelatedTerms => {
                let terms = self.store.related_terms(keyword).await?;
                latest_collected(terms.iter().map(|t| &t.collected_at))
            }
            Category::TagSuggestions => {
                let tags = self
                    .store
                    .tag_suggestions(keyword, self.aggregator.settings().tag_limit)
                    .await?;
                latest_collected(tags.iter().map(|t| &t.collected_at))
            }
        })
    }

    /// `true` when the stored category is absent or past the refresh boundary.
    pub async fn is_due(&self, keyword: &str, category: Category) -> Result<bool> {
        let at = self.collected_at(keyword, category).await?;
        Ok(self.policy.should_refresh(at, self.clock.now()))
    }

    /// Refresh one category if due (or unconditionally with `force`).
    /// Returns `true` when new data was written.
    pub async fn refresh(&self, keyword: &str, category: Category, force: bool) -> Result<bool> {
        let key = (keyword.to_string(), category);
        let lock = self.locks.handle(&key);
        let written = {
            let _guard = lock.lock().await;
            if !force && !self.is_due(keyword, category).await? {
                debug!(keyword = %keyword, category = %category, "already refreshed, skipping");
                Ok(false)
            } else {
                self.fetch_and_store(keyword, category).await
            }
        };
        drop(lock);
        self.locks.release(&key);
        written
    }

    /// Refresh several categories concurrently, settling all of them.
    /// Returns the categories that were written.
    pub async fn refresh_all(&self, keyword: &str, categories: &[Category], force: bool) -> Vec<Category> {
        let results = join_all(categories.iter().map(|c| async move {
            match self.refresh(keyword, *c, force).await {
                Ok(true) => Some(*c),
                Ok(false) => None,
                Err(e) => {
                    warn!(keyword = %keyword, category = %c, error = %e, "refresh failed");
                    None
                }
            }
        }))
        .await;
        results.into_iter().flatten().collect()
    }

    async fn fetch_and_store(&self, keyword: &str, category: Category) -> Result<bool> {
        let now = self.clock.now();
        let agg = &self.aggregator;
        match category {
            Category::Metrics => {
                let sample = agg.metrics(keyword).await;
                self.store
                    .upsert_metrics(&MetricsRecord {
                        keyword: keyword.to_string(),
                        period: period_of(now),
                        search_volume: Some(sample.estimate.search_volume),
                        competition_level: Some(sample.estimate.competition_level),
                        competition_index: Some(sample.estimate.competition_index),
                        document_count: sample.estimate.document_count,
                        source: sample.source,
                        collected_at: now,
                    })
                    .await?;
            }
            Category::Trends => {
                let series = agg.trends(keyword, now.date_naive()).await;
                let points: Vec<TrendPoint> = series
                    .points
                    .into_iter()
                    .map(|p| TrendPoint {
                        keyword: keyword.to_string(),
                        date: p.date,
                        value: p.value,
                        source: series.source.clone(),
                        collected_at: now,
                    })
                    .collect();
                self.store.upsert_trends(&points).await?;
            }
            Category::RelatedTerms => {
                let Some(ranked) = agg.related(keyword).await else {
                    return Ok(false);
                };
                let source = agg.related_source().to_string();
                let terms: Vec<RelatedTerm> = ranked
                    .into_iter()
                    .map(|t| RelatedTerm {
                        root_keyword: keyword.to_string(),
                        term: t.term,
                        relevance: t.relevance,
                        search_volume: None,
                        source: source.clone(),
                        collected_at: now,
                    })
                    .collect();
                self.store.replace_related_terms(keyword, &terms).await?;
            }
            Category::TagSuggestions => {
                let harvest = agg.tags(keyword).await;
                let tags: Vec<TagSuggestion> = harvest
                    .tags
                    .into_iter()
                    .map(|t| TagSuggestion {
                        root_keyword: keyword.to_string(),
                        tag: t.tag,
                        frequency: t.frequency.max(1),
                        category: t.category,
                        source: t.source,
                        collected_at: now,
                    })
                    .collect();
                self.store.upsert_tags(&tags).await?;
            }
        }
        debug!(keyword = %keyword, category = %category, "category refreshed");
        Ok(true)
    }
}

/// What a dispatcher did with a refresh request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Refreshes ran to completion; lists the categories that were written.
    Completed(Vec<Category>),
    /// Refreshes were queued and will complete in the background.
    Queued(Vec<Category>),
}

impl DispatchOutcome {
    pub fn written(&self) -> &[Category] {
        match self {
            DispatchOutcome::Completed(c) => c,
            DispatchOutcome::Queued(_) => &[],
        }
    }
}

#[async_trait]
pub trait RefreshDispatcher: Send + Sync {
    async fn dispatch(&self, keyword: &str, categories: Vec<Category>, force: bool) -> DispatchOutcome;
}

/// Runs refreshes before returning.
pub struct InlineDispatcher {
    refresher: Arc<Refresher>,
}

impl InlineDispatcher {
    pub fn new(refresher: Arc<Refresher>) -> Self {
        Self { refresher }
    }
}

#[async_trait]
impl RefreshDispatcher for InlineDispatcher {
    async fn dispatch(&self, keyword: &str, categories: Vec<Category>, force: bool) -> DispatchOutcome {
        if categories.is_empty() {
            return DispatchOutcome::Completed(Vec::new());
        }
        DispatchOutcome::Completed(self.refresher.refresh_all(keyword, &categories, force).await)
    }
}

struct RefreshJob {
    keyword: String,
    categories: Vec<Category>,
    force: bool,
}

/// Queues refreshes for a background worker (fire-and-forget).
pub struct QueuedDispatcher {
    tx: mpsc::UnboundedSender<RefreshJob>,
    in_flight: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl QueuedDispatcher {
    /// Spawn the worker on the current tokio runtime.
    pub fn spawn(refresher: Arc<Refresher>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<RefreshJob>();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let idle = Arc::new(Notify::new());

        let worker_in_flight = in_flight.clone();
        let worker_idle = idle.clone();
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let refresher = refresher.clone();
                let in_flight = worker_in_flight.clone();
                let idle = worker_idle.clone();
                tokio::spawn(async move {
                    let written = refresher.refresh_all(&job.keyword, &job.categories, job.force).await;
                    debug!(keyword = %job.keyword, written = written.len(), "queued refresh finished");
                    if in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
                        idle.notify_waiters();
                    }
                });
            }
        });

        Self { tx, in_flight, idle }
    }

    /// Wait until every queued refresh has finished.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.in_flight.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl RefreshDispatcher for QueuedDispatcher {
    async fn dispatch(&self, keyword: &str, categories: Vec<Category>, force: bool) -> DispatchOutcome {
        if categories.is_empty() {
            return DispatchOutcome::Queued(Vec::new());
        }
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let job = RefreshJob {
            keyword: keyword.to_string(),
            categories: categories.clone(),
            force,
        };
        if self.tx.send(job).is_err() {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            warn!(keyword = %keyword, "refresh worker is gone, dropping job");
        }
        DispatchOutcome::Queued(categories)
    }
}
