//! Core data models used throughout Keyword Scout.
//!
//! One record type per data category (metrics, trends, related terms, tag
//! suggestions) plus the per-keyword search history row. Every category
//! record carries a `source` tag so consumers can tell vendor data from
//! synthetic estimates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Provenance tags attached to stored records and served categories.
pub mod source_tags {
    pub const NAVER_SEARCH_API: &str = "naver-search-api";
    pub const NAVER_DATALAB: &str = "naver-datalab";
    pub const NAVER_AUTOCOMPLETE: &str = "naver-autocomplete";
    pub const BLOG_CRAWLING: &str = "blog-crawling";
    pub const KEYWORD_ANALYSIS: &str = "keyword-analysis";
    pub const CACHE: &str = "cache";
    pub const FALLBACK: &str = "fallback";
}

/// Three-level competition bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CompetitionLevel {
    Low,
    Medium,
    High,
}

impl CompetitionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompetitionLevel::Low => "LOW",
            CompetitionLevel::Medium => "MEDIUM",
            CompetitionLevel::High => "HIGH",
        }
    }

    /// Parses the stored representation; unknown values yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "LOW" => Some(CompetitionLevel::Low),
            "MEDIUM" => Some(CompetitionLevel::Medium),
            "HIGH" => Some(CompetitionLevel::High),
            _ => None,
        }
    }
}

impl fmt::Display for CompetitionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four independently fetched data categories of a keyword analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Metrics,
    Trends,
    RelatedTerms,
    TagSuggestions,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Metrics,
        Category::Trends,
        Category::RelatedTerms,
        Category::TagSuggestions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Metrics => "metrics",
            Category::Trends => "trends",
            Category::RelatedTerms => "related-terms",
            Category::TagSuggestions => "tag-suggestions",
        }
    }

    /// Source tag reported for this category before any data exists.
    pub fn default_source(&self) -> &'static str {
        match self {
            Category::Metrics => source_tags::NAVER_SEARCH_API,
            Category::Trends => source_tags::NAVER_DATALAB,
            Category::RelatedTerms => source_tags::NAVER_AUTOCOMPLETE,
            Category::TagSuggestions => source_tags::BLOG_CRAWLING,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Search history row, one per normalized keyword.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordRecord {
    pub keyword: String,
    pub first_searched_at: DateTime<Utc>,
    pub last_searched_at: DateTime<Utc>,
    pub search_count: i64,
}

/// Search volume and competition for one keyword in one `YYYY-MM` period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsRecord {
    pub keyword: String,
    pub period: String,
    pub search_volume: Option<i64>,
    pub competition_level: Option<CompetitionLevel>,
    pub competition_index: Option<f64>,
    /// Raw sum of result counts across search verticals, when known.
    pub document_count: Option<i64>,
    pub source: String,
    pub collected_at: DateTime<Utc>,
}

/// One point of a keyword's trend series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub keyword: String,
    /// `YYYY-MM-DD` for daily series, `YYYY-MM-01` for monthly ones.
    pub date: String,
    pub value: i64,
    pub source: String,
    pub collected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedTerm {
    pub root_keyword: String,
    pub term: String,
    /// Rank-derived relevance in `[0, 1]`.
    pub relevance: f64,
    pub search_volume: Option<i64>,
    pub source: String,
    pub collected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagSuggestion {
    pub root_keyword: String,
    pub tag: String,
    /// Occurrence counter, always `>= 1`. Accumulates across refreshes.
    pub frequency: i64,
    pub category: Option<String>,
    pub source: String,
    pub collected_at: DateTime<Utc>,
}

/// Normalize a raw search term: trim, collapse inner whitespace, lowercase.
///
/// Returns `None` when nothing is left.
pub fn normalize_keyword(raw: &str) -> Option<String> {
    let joined = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if joined.is_empty() {
        None
    } else {
        Some(joined.to_lowercase())
    }
}

/// `YYYY-MM` period label for a timestamp.
pub fn period_of(at: DateTime<Utc>) -> String {
    at.format("%Y-%m").to_string()
}
