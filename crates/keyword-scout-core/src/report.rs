//! Composite keyword analysis payload.
//!
//! The JSON shape served by `POST /keywords/research` and cached in the
//! report cache. Every category group carries its own `freshness` and
//! `source`, so a consumer can tell live vendor data from cached data and
//! from synthetic estimates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::freshness::Freshness;
use crate::models::{source_tags, CompetitionLevel, MetricsRecord, RelatedTerm, TagSuggestion, TrendPoint};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordAnalysisResponse {
    pub keyword: String,
    pub timestamp: DateTime<Utc>,
    pub metrics: MetricsView,
    pub trends: TrendsView,
    pub related_terms: RelatedTermsView,
    pub tag_suggestions: TagSuggestionsView,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsView {
    pub search_volume: Option<i64>,
    pub competition: Option<CompetitionLevel>,
    pub competition_index: Option<f64>,
    pub freshness: Freshness,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendValue {
    pub date: String,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendsView {
    pub data: Vec<TrendValue>,
    pub freshness: Freshness,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedTermValue {
    pub term: String,
    pub relevance: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_volume: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedTermsView {
    pub terms: Vec<RelatedTermValue>,
    pub freshness: Freshness,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagValue {
    pub tag: String,
    pub frequency: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagSuggestionsView {
    pub tags: Vec<TagValue>,
    pub freshness: Freshness,
    pub source: String,
}

impl MetricsView {
    pub fn from_record(record: Option<&MetricsRecord>, freshness: Freshness, source: String) -> Self {
        Self {
            search_volume: record.and_then(|r| r.search_volume),
            competition: record.and_then(|r| r.competition_level),
            competition_index: record.and_then(|r| r.competition_index),
            freshness,
            source,
        }
    }
}

impl TrendsView {
    pub fn from_points(points: &[TrendPoint], freshness: Freshness, source: String) -> Self {
        Self {
            data: points
                .iter()
                .map(|p| TrendValue {
                    date: p.date.clone(),
                    value: p.value,
                })
                .collect(),
            freshness,
            source,
        }
    }
}

impl RelatedTermsView {
    pub fn from_terms(terms: &[RelatedTerm], freshness: Freshness, source: String) -> Self {
        Self {
            terms: terms
                .iter()
                .map(|t| RelatedTermValue {
                    term: t.term.clone(),
                    relevance: t.relevance,
                    search_volume: t.search_volume,
                })
                .collect(),
            freshness,
            source,
        }
    }
}

impl TagSuggestionsView {
    pub fn from_tags(tags: &[TagSuggestion], freshness: Freshness, source: String) -> Self {
        Self {
            tags: tags
                .iter()
                .map(|t| TagValue {
                    tag: t.tag.clone(),
                    frequency: t.frequency,
                    category: t.category.clone(),
                })
                .collect(),
            freshness,
            source,
        }
    }
}

fn cached_source(source: &mut String) {
    if source != source_tags::FALLBACK {
        *source = source_tags::CACHE.to_string();
    }
}

impl KeywordAnalysisResponse {
    /// `true` when the metrics group holds a value.
    pub fn has_metrics(&self) -> bool {
        self.metrics.search_volume.is_some()
    }

    /// Relabel a report being replayed from the report cache: every vendor
    /// source becomes `cache`, synthetic data stays `fallback`.
    pub fn served_from_cache(mut self) -> Self {
        cached_source(&mut self.metrics.source);
        cached_source(&mut self.trends.source);
        cached_source(&mut self.related_terms.source);
        cached_source(&mut self.tag_suggestions.source);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;

    fn empty_report() -> KeywordAnalysisResponse {
        let ts = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        KeywordAnalysisResponse {
            keyword: "rust".into(),
            timestamp: ts,
            metrics: MetricsView::from_record(None, Freshness::Processing, source_tags::FALLBACK.into()),
            trends: TrendsView::from_points(&[], Freshness::Fresh, Category::Trends.default_source().into()),
            related_terms: RelatedTermsView::from_terms(&[], Freshness::Processing, source_tags::NAVER_AUTOCOMPLETE.into()),
            tag_suggestions: TagSuggestionsView::from_tags(&[], Freshness::Fresh, source_tags::KEYWORD_ANALYSIS.into()),
        }
    }

    #[test]
    fn test_json_shape_is_camel_case() {
        let value = serde_json::to_value(empty_report()).unwrap();
        assert!(value.get("relatedTerms").is_some());
        assert!(value.get("tagSuggestions").is_some());
        assert_eq!(value["metrics"]["searchVolume"], serde_json::Value::Null);
        assert_eq!(value["metrics"]["freshness"], "processing");
        assert_eq!(value["trends"]["data"], serde_json::json!([]));
    }

    #[test]
    fn test_served_from_cache_keeps_fallback() {
        let report = empty_report().served_from_cache();
        assert_eq!(report.metrics.source, source_tags::FALLBACK);
        assert_eq!(report.trends.source, source_tags::CACHE);
        assert_eq!(report.related_terms.source, source_tags::CACHE);
        assert_eq!(report.tag_suggestions.source, source_tags::CACHE);
        assert!(!report.has_metrics());
    }
}
