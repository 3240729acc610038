//! Bulk research: breadth-first expansion from a seed keyword through
//! related terms.
//!
//! Each visited keyword is researched inline (whatever the configured
//! dispatch mode) so its related terms are available for expansion. A
//! candidate already seen, or the seed itself, counts as a skipped
//! duplicate.

use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use keyword_scout_core::models::{normalize_keyword, CompetitionLevel, MetricsRecord};
use keyword_scout_core::store::KeywordStore;

use crate::error::{ResearchError, ResearchResult};
use crate::research::{require_keyword, ResearchService};

/// Share of total search volume attributed to desktop.
const PC_SHARE: f64 = 0.3;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkRequest {
    pub initial_keyword: String,
    pub search_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordMetricsSummary {
    pub keyword: String,
    pub pc_monthly_search_volume: i64,
    pub mobile_monthly_search_volume: i64,
    pub total_monthly_search_volume: i64,
    pub document_count: i64,
    pub competition_rate: f64,
    pub competition_level: CompetitionLevel,
}

impl KeywordMetricsSummary {
    pub fn from_metrics(keyword: &str, metrics: Option<&MetricsRecord>) -> Self {
        let total = metrics.and_then(|m| m.search_volume).unwrap_or(0).max(0);
        let pc = (total as f64 * PC_SHARE).round() as i64;
        Self {
            keyword: keyword.to_string(),
            pc_monthly_search_volume: pc,
            mobile_monthly_search_volume: total - pc,
            total_monthly_search_volume: total,
            document_count: metrics.and_then(|m| m.document_count).unwrap_or(0),
            competition_rate: metrics.and_then(|m| m.competition_index).unwrap_or(0.0),
            competition_level: metrics
                .and_then(|m| m.competition_level)
                .unwrap_or(CompetitionLevel::Low),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkResponse {
    pub keywords: Vec<KeywordMetricsSummary>,
    pub total_searched: usize,
    pub skipped_duplicates: usize,
    pub completed_at: DateTime<Utc>,
}

impl ResearchService {
    /// Research up to `request.search_count` keywords reachable from the
    /// seed. `max` bounds the count.
    pub async fn bulk_research(&self, request: &BulkRequest, max: usize) -> ResearchResult<BulkResponse> {
        let seed = require_keyword(&request.initial_keyword)?;
        let wanted = request.search_count;
        if wanted == 0 || wanted > max {
            return Err(ResearchError::invalid(format!("searchCount must be between 1 and {max}")));
        }

        let mut queue = VecDeque::from([seed.clone()]);
        let mut seen = HashSet::from([seed.clone()]);
        let mut skipped = 0usize;
        let mut keywords = Vec::with_capacity(wanted);

        while let Some(keyword) = queue.pop_front() {
            if keywords.len() >= wanted {
                break;
            }
            if let Err(e) = self.research_inline(&keyword).await {
                warn!(keyword = %keyword, error = %e, "bulk research failed for keyword");
                continue;
            }
            let metrics = self.store().latest_metrics(&keyword).await?;
            keywords.push(KeywordMetricsSummary::from_metrics(&keyword, metrics.as_ref()));
            if keywords.len() >= wanted {
                break;
            }

            for related in self.store().related_terms(&keyword).await? {
                let Some(candidate) = normalize_keyword(&related.term) else {
                    continue;
                };
                if seen.insert(candidate.clone()) {
                    queue.push_back(candidate);
                } else {
                    skipped += 1;
                }
            }
        }

        info!(
            seed = %seed,
            requested = wanted,
            searched = keywords.len(),
            skipped,
            "bulk research complete"
        );
        Ok(BulkResponse {
            total_searched: keywords.len(),
            keywords,
            skipped_duplicates: skipped,
            completed_at: self.clock().now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_splits_volume() {
        let record = MetricsRecord {
            keyword: "rust".into(),
            period: "2024-07".into(),
            search_volume: Some(1001),
            competition_level: Some(CompetitionLevel::Medium),
            competition_index: Some(0.42),
            document_count: Some(123_456),
            source: "naver-search-api".into(),
            collected_at: Utc::now(),
        };
        let s = KeywordMetricsSummary::from_metrics("rust", Some(&record));
        assert_eq!(s.pc_monthly_search_volume, 300);
        assert_eq!(s.mobile_monthly_search_volume, 701);
        assert_eq!(s.total_monthly_search_volume, 1001);
        assert_eq!(s.document_count, 123_456);
        assert_eq!(s.competition_level, CompetitionLevel::Medium);
    }

    #[test]
    fn test_summary_without_metrics() {
        let s = KeywordMetricsSummary::from_metrics("rust", None);
        assert_eq!(s.total_monthly_search_volume, 0);
        assert_eq!(s.document_count, 0);
        assert_eq!(s.competition_rate, 0.0);
        assert_eq!(s.competition_level, CompetitionLevel::Low);

        let json = serde_json::to_value(&s).unwrap();
        assert!(json.get("pcMonthlySearchVolume").is_some());
        assert_eq!(json["competitionLevel"], "LOW");
    }
}
