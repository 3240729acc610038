//! Multi-source aggregation with per-category failure isolation.
//!
//! Each category fetch is raced against a timer and never fails outward:
//!
//! | Category | On failure or timeout |
//! |----------|-----------------------|
//! | metrics | synthetic estimate (`fallback`) |
//! | trends | synthetic series (`fallback`) |
//! | related terms | `None`; nothing invented |
//! | tags | keyword-derived variants only |
//!
//! [`Aggregator::aggregate`] runs the requested categories concurrently and
//! waits for all of them to settle.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::NaiveDate;
use tracing::{debug, info, warn};

use keyword_scout_core::models::{source_tags, Category};
use keyword_scout_core::providers::{
    MetricsSample, MetricsSource, RelatedSource, TagSource, TrendSeries, TrendSource, TrendWindow,
};
use keyword_scout_core::related::{rank_related_terms, RankedTerm};
use keyword_scout_core::synthetic::SyntheticProvider;
use keyword_scout_core::tags::{merge_tags, variant_tags, FrequencyTally, TagCandidate};

use crate::credentials::MissingCredentials;

/// Tunables for one aggregator.
#[derive(Debug, Clone)]
pub struct AggregatorSettings {
    pub call_timeout: Duration,
    pub related_timeout: Duration,
    pub trend_window: TrendWindow,
    pub related_limit: usize,
    pub tag_limit: usize,
}

/// The four primary sources. Any of them may be the same object.
#[derive(Clone)]
pub struct Sources {
    pub metrics: Arc<dyn MetricsSource>,
    pub trends: Arc<dyn TrendSource>,
    pub related: Arc<dyn RelatedSource>,
    pub tags: Arc<dyn TagSource>,
}

/// Tag suggestions plus the source label for the category.
#[derive(Debug, Clone, PartialEq)]
pub struct TagHarvest {
    pub tags: Vec<TagCandidate>,
    pub source: String,
}

/// Result of one aggregation pass. `None` fields were either not requested
/// or, for related terms, failed.
#[derive(Debug, Default)]
pub struct Aggregate {
    pub metrics: Option<MetricsSample>,
    pub trends: Option<TrendSeries>,
    pub related: Option<Vec<RankedTerm>>,
    pub tags: Option<TagHarvest>,
}

pub struct Aggregator {
    sources: Sources,
    synthetic: SyntheticProvider,
    settings: AggregatorSettings,
}

fn log_failure(category: Category, keyword: &str, err: &anyhow::Error) {
    if err.is::<MissingCredentials>() {
        debug!(keyword = %keyword, category = %category, "no credentials, skipping vendor source");
    } else {
        warn!(keyword = %keyword, category = %category, error = %err, "source failed");
    }
}

async fn race<T, F>(limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => anyhow::bail!("timed out after {:?}", limit),
    }
}

impl Aggregator {
    pub fn new(sources: Sources, settings: AggregatorSettings) -> Self {
        Self {
            sources,
            synthetic: SyntheticProvider::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &AggregatorSettings {
        &self.settings
    }

    /// Source label stamped on related terms.
    pub fn related_source(&self) -> &str {
        self.sources.related.source()
    }

    pub async fn metrics(&self, keyword: &str) -> MetricsSample {
        match race(self.settings.call_timeout, self.sources.metrics.fetch_metrics(keyword)).await {
            Ok(sample) => sample,
            Err(e) => {
                log_failure(Category::Metrics, keyword, &e);
                MetricsSample {
                    estimate: self.synthetic.metrics(keyword),
                    source: source_tags::FALLBACK.to_string(),
                }
            }
        }
    }

    pub async fn trends(&self, keyword: &str, today: NaiveDate) -> TrendSeries {
        let window = self.settings.trend_window;
        let fetched = race(
            self.settings.call_timeout,
            self.sources.trends.fetch_trends(keyword, window, today),
        )
        .await;
        match fetched {
            Ok(series) => series,
            Err(e) => {
                log_failure(Category::Trends, keyword, &e);
                TrendSeries {
                    points: self.synthetic.trends(keyword, window, today),
                    source: source_tags::FALLBACK.to_string(),
                }
            }
        }
    }

    pub async fn related(&self, keyword: &str) -> Option<Vec<RankedTerm>> {
        match race(self.settings.related_timeout, self.sources.related.fetch_related(keyword)).await {
            Ok(candidates) => Some(rank_related_terms(keyword, &candidates, self.settings.related_limit)),
            Err(e) => {
                log_failure(Category::RelatedTerms, keyword, &e);
                None
            }
        }
    }

    pub async fn tags(&self, keyword: &str) -> TagHarvest {
        let mut tally = FrequencyTally::new();
        match race(self.settings.call_timeout, self.sources.tags.fetch_page_texts(keyword)).await {
            Ok(texts) => texts.iter().for_each(|t| tally.add_text(t, keyword)),
            Err(e) => log_failure(Category::TagSuggestions, keyword, &e),
        }

        let source = if tally.is_empty() {
            source_tags::KEYWORD_ANALYSIS.to_string()
        } else {
            self.sources.tags.source().to_string()
        };
        let limit = self.settings.tag_limit;
        TagHarvest {
            tags: merge_tags(tally.ranked(limit), &variant_tags(keyword), limit),
            source,
        }
    }

    /// Fetch the requested categories concurrently, settling all of them.
    pub async fn aggregate(&self, keyword: &str, categories: &[Category], today: NaiveDate) -> Aggregate {
        let wants = |c: Category| categories.contains(&c);
        let (metrics, trends, related, tags) = tokio::join!(
            async { if wants(Category::Metrics) { Some(self.metrics(keyword).await) } else { None } },
            async { if wants(Category::Trends) { Some(self.trends(keyword, today).await) } else { None } },
            async { if wants(Category::RelatedTerms) { self.related(keyword).await } else { None } },
            async { if wants(Category::TagSuggestions) { Some(self.tags(keyword).await) } else { None } },
        );
        info!(
            keyword = %keyword,
            metrics = metrics.as_ref().map(|m| m.source.as_str()).unwrap_or("-"),
            trends = trends.as_ref().map(|t| t.source.as_str()).unwrap_or("-"),
            related = related.as_ref().map(|r| r.len()).unwrap_or(0),
            tags = tags.as_ref().map(|t| t.tags.len()).unwrap_or(0),
            "aggregation settled"
        );
        Aggregate {
            metrics,
            trends,
            related,
            tags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use keyword_scout_core::providers::TrendSample;
    use keyword_scout_core::scoring::{estimate_metrics, ResultCounts};

    struct Failing;

    #[async_trait]
    impl MetricsSource for Failing {
        async fn fetch_metrics(&self, _keyword: &str) -> Result<MetricsSample> {
            anyhow::bail!("boom")
        }
    }

    #[async_trait]
    impl TrendSource for Failing {
        async fn fetch_trends(&self, _k: &str, _w: TrendWindow, _t: NaiveDate) -> Result<TrendSeries> {
            Err(MissingCredentials.into())
        }
    }

    #[async_trait]
    impl RelatedSource for Failing {
        fn source(&self) -> &str {
            "naver-autocomplete"
        }
        async fn fetch_related(&self, _keyword: &str) -> Result<Vec<String>> {
            anyhow::bail!("boom")
        }
    }

    #[async_trait]
    impl TagSource for Failing {
        fn source(&self) -> &str {
            "blog-crawling"
        }
        async fn fetch_page_texts(&self, _keyword: &str) -> Result<Vec<String>> {
            anyhow::bail!("boom")
        }
    }

    struct Slow;

    #[async_trait]
    impl MetricsSource for Slow {
        async fn fetch_metrics(&self, _keyword: &str) -> Result<MetricsSample> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(MetricsSample {
                estimate: estimate_metrics(&ResultCounts {
                    blog: Some(1),
                    ..Default::default()
                })
                .unwrap(),
                source: "naver-search-api".into(),
            })
        }
    }

    #[async_trait]
    impl TrendSource for Slow {
        async fn fetch_trends(&self, _k: &str, _w: TrendWindow, _t: NaiveDate) -> Result<TrendSeries> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(TrendSeries {
                points: vec![TrendSample {
                    date: "2024-01-01".into(),
                    value: 1,
                }],
                source: "naver-datalab".into(),
            })
        }
    }

    fn settings(window: TrendWindow) -> AggregatorSettings {
        AggregatorSettings {
            call_timeout: Duration::from_millis(50),
            related_timeout: Duration::from_millis(50),
            trend_window: window,
            related_limit: 20,
            tag_limit: 15,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 15).unwrap()
    }

    #[tokio::test]
    async fn test_total_failure_falls_back_per_category() {
        let failing = Arc::new(Failing);
        let agg = Aggregator::new(
            Sources {
                metrics: failing.clone(),
                trends: failing.clone(),
                related: failing.clone(),
                tags: failing,
            },
            settings(TrendWindow::Monthly),
        );
        let out = agg.aggregate("탈모", &Category::ALL, today()).await;

        assert_eq!(out.metrics.unwrap().source, source_tags::FALLBACK);
        let trends = out.trends.unwrap();
        assert_eq!(trends.source, source_tags::FALLBACK);
        assert_eq!(trends.points.len(), 12);
        assert!(out.related.is_none());
        let tags = out.tags.unwrap();
        assert_eq!(tags.source, source_tags::KEYWORD_ANALYSIS);
        assert!(!tags.tags.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let agg = Aggregator::new(
            Sources {
                metrics: Arc::new(Slow),
                trends: Arc::new(Slow),
                related: Arc::new(Failing),
                tags: Arc::new(Failing),
            },
            settings(TrendWindow::Daily),
        );
        let started = std::time::Instant::now();
        let out = agg
            .aggregate("rust", &[Category::Metrics, Category::Trends], today())
            .await;
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(out.metrics.unwrap().source, source_tags::FALLBACK);
        assert_eq!(out.trends.unwrap().points.len(), 30);
        assert!(out.tags.is_none());
    }
}
