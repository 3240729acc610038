//! Data-source traits for the four research categories.
//!
//! Real vendor clients and the synthetic generator implement the same
//! traits, so the aggregator can swap one for the other without changing
//! the data it stores. Every returned payload carries its source tag.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::scoring::MetricsEstimate;

/// Metrics produced by one source.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSample {
    pub estimate: MetricsEstimate,
    pub source: String,
}

/// One raw point of a trend series (`value` is a ratio in `[0, 100]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSample {
    pub date: String,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrendSeries {
    pub points: Vec<TrendSample>,
    pub source: String,
}

/// Lookback window of a trend series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendWindow {
    /// 12 points, first day of each month, ending with the current month.
    Monthly,
    /// 30 points, one per day, ending today.
    Daily,
}

impl TrendWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendWindow::Monthly => "monthly",
            TrendWindow::Daily => "daily",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "monthly" => Some(TrendWindow::Monthly),
            "daily" => Some(TrendWindow::Daily),
            _ => None,
        }
    }

    pub fn points(&self) -> usize {
        match self {
            TrendWindow::Monthly => 12,
            TrendWindow::Daily => 30,
        }
    }

    /// Vendor time unit name.
    pub fn time_unit(&self) -> &'static str {
        match self {
            TrendWindow::Monthly => "month",
            TrendWindow::Daily => "date",
        }
    }

    /// Dates of every point in the window, oldest first.
    pub fn dates(&self, today: NaiveDate) -> Vec<NaiveDate> {
        match self {
            TrendWindow::Daily => (0..self.points() as i64)
                .rev()
                .map(|back| today - Duration::days(back))
                .collect(),
            TrendWindow::Monthly => (0..self.points() as i32)
                .rev()
                .filter_map(|back| first_of_month_back(today, back))
                .collect(),
        }
    }
}

fn first_of_month_back(today: NaiveDate, months_back: i32) -> Option<NaiveDate> {
    let total = today.year() * 12 + today.month0() as i32 - months_back;
    NaiveDate::from_ymd_opt(total.div_euclid(12), total.rem_euclid(12) as u32 + 1, 1)
}

/// Source of search volume and competition estimates.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn fetch_metrics(&self, keyword: &str) -> Result<MetricsSample>;
}

/// Source of a trend series over a window ending at `today`.
#[async_trait]
pub trait TrendSource: Send + Sync {
    async fn fetch_trends(
        &self,
        keyword: &str,
        window: TrendWindow,
        today: NaiveDate,
    ) -> Result<TrendSeries>;
}

/// Source of raw related-term candidates, in the vendor's rank order.
#[async_trait]
pub trait RelatedSource: Send + Sync {
    fn source(&self) -> &str;

    async fn fetch_related(&self, keyword: &str) -> Result<Vec<String>>;
}

/// Source of page texts to mine for tags.
///
/// Individual page failures are the implementation's concern; an `Err`
/// means nothing at all could be fetched.
#[async_trait]
pub trait TagSource: Send + Sync {
    fn source(&self) -> &str;

    async fn fetch_page_texts(&self, keyword: &str) -> Result<Vec<String>>;
}
