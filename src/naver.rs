//! Naver vendor sources.
//!
//! One [`NaverClient`] implements all four data-source traits:
//!
//! | Category | Endpoint | Credentials |
//! |----------|----------|-------------|
//! | metrics | `GET /v1/search/{blog,news,cafearticle,shop}.json` (`total`) | id + secret |
//! | trends | `POST /v1/datalab/search` | id + secret |
//! | related terms | autocomplete (`/nx/ac`) | none |
//! | tags | search result pages (`where=post|article|news`) | none |
//!
//! Metrics fan out to the four search verticals concurrently; a failed
//! vertical is logged and contributes no count. Every request carries a
//! timeout from `[sources]`.

use std::sync::{Arc, OnceLock};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use futures::future::join_all;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use keyword_scout_core::models::source_tags;
use keyword_scout_core::providers::{
    MetricsSample, MetricsSource, RelatedSource, TagSource, TrendSample, TrendSeries, TrendSource,
    TrendWindow,
};
use keyword_scout_core::related::parse_autocomplete;
use keyword_scout_core::scoring::{estimate_metrics, ResultCounts};

use crate::config::SourcesConfig;
use crate::credentials::{CredentialCheck, CredentialStore, MissingCredentials};

/// Search vertical backing one component of the metrics estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Vertical {
    Blog,
    News,
    Forum,
    Commerce,
}

impl Vertical {
    const ALL: [Vertical; 4] = [Vertical::Blog, Vertical::News, Vertical::Forum, Vertical::Commerce];

    fn endpoint(&self) -> &'static str {
        match self {
            Vertical::Blog => "blog",
            Vertical::News => "news",
            Vertical::Forum => "cafearticle",
            Vertical::Commerce => "shop",
        }
    }
}

/// Search result page types mined for tags.
const TAG_PAGES: [&str; 3] = ["post", "article", "news"];

#[derive(Debug, Deserialize)]
struct SearchTotal {
    total: u64,
}

#[derive(Debug, Deserialize)]
struct DatalabResponse {
    #[serde(default)]
    results: Vec<DatalabResult>,
}

#[derive(Debug, Deserialize)]
struct DatalabResult {
    #[serde(default)]
    data: Vec<DatalabPoint>,
}

#[derive(Debug, Deserialize)]
struct DatalabPoint {
    period: String,
    ratio: f64,
}

pub struct NaverClient {
    http: reqwest::Client,
    sources: SourcesConfig,
    credentials: Arc<CredentialStore>,
}

impl NaverClient {
    pub fn new(sources: SourcesConfig, credentials: Arc<CredentialStore>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(sources.user_agent.clone())
            .timeout(sources.timeout())
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            sources,
            credentials,
        })
    }

    fn search_pair(&self) -> Result<(String, String)> {
        match self.credentials.snapshot().search_pair() {
            Some(pair) => Ok(pair),
            None => Err(MissingCredentials.into()),
        }
    }

    fn openapi(&self, path: &str) -> String {
        format!("{}{}", self.sources.openapi_url.trim_end_matches('/'), path)
    }

    async fn search_total(&self, vertical: Vertical, keyword: &str, id: &str, secret: &str) -> Result<u64> {
        let url = self.openapi(&format!("/v1/search/{}.json", vertical.endpoint()));
        let resp = self
            .http
            .get(&url)
            .query(&[("query", keyword), ("display", "1")])
            .header("X-Naver-Client-Id", id)
            .header("X-Naver-Client-Secret", secret)
            .send()
            .await
            .with_context(|| format!("{} search request failed", vertical.endpoint()))?;

        if !resp.status().is_success() {
            bail!("{} search returned {}", vertical.endpoint(), resp.status());
        }
        let body: SearchTotal = resp
            .json()
            .await
            .with_context(|| format!("{} search payload malformed", vertical.endpoint()))?;
        Ok(body.total)
    }

    /// Issue one search request with the current credentials and report
    /// whether they work.
    pub async fn verify_credentials(&self) -> CredentialCheck {
        let (id, secret) = match self.search_pair() {
            Ok(pair) => pair,
            Err(_) => {
                return CredentialCheck {
                    is_valid: false,
                    message: "API credentials are not configured.".to_string(),
                }
            }
        };

        let result = self
            .http
            .get(self.openapi("/v1/search/blog.json"))
            .query(&[("query", "test"), ("display", "1")])
            .header("X-Naver-Client-Id", &id)
            .header("X-Naver-Client-Secret", &secret)
            .timeout(self.sources.autocomplete_timeout())
            .send()
            .await;

        let (is_valid, message) = match result {
            Ok(resp) if resp.status().is_success() => (true, "API credentials are working.".to_string()),
            Ok(resp) => match resp.status().as_u16() {
                401 => (false, "API credentials are invalid.".to_string()),
                403 => (false, "API credentials lack permission for this API.".to_string()),
                code => (false, format!("API test failed: HTTP {code}")),
            },
            Err(e) => {
                warn!(error = %e, "credential test request failed");
                (false, format!("API test failed: {e}"))
            }
        };
        CredentialCheck { is_valid, message }
    }

    async fn fetch_page(&self, page: &str, keyword: &str) -> Result<String> {
        let resp = self
            .http
            .get(&self.sources.search_url)
            .query(&[("where", page), ("query", keyword), ("ie", "utf8")])
            .header("Accept", "text/html,application/xhtml+xml")
            .header("Accept-Language", "ko-KR,ko;q=0.9,en;q=0.8")
            .send()
            .await
            .with_context(|| format!("{page} page request failed"))?;
        if !resp.status().is_success() {
            bail!("{page} page returned {}", resp.status());
        }
        Ok(html_to_text(&resp.text().await?))
    }
}

#[async_trait]
impl MetricsSource for NaverClient {
    async fn fetch_metrics(&self, keyword: &str) -> Result<MetricsSample> {
        let (id, secret) = self.search_pair()?;

        let calls = Vertical::ALL.into_iter().map(|vertical| {
            let (id, secret) = (&id, &secret);
            async move {
                match self.search_total(vertical, keyword, id, secret).await {
                    Ok(total) => Some(total),
                    Err(e) => {
                        warn!(
                            keyword = %keyword,
                            vertical = vertical.endpoint(),
                            error = %e,
                            "search vertical failed"
                        );
                        None
                    }
                }
            }
        });
        let totals = join_all(calls).await;

        let counts = ResultCounts {
            blog: totals[0],
            news: totals[1],
            forum: totals[2],
            commerce: totals[3],
        };
        match estimate_metrics(&counts) {
            Some(estimate) => Ok(MetricsSample {
                estimate,
                source: source_tags::NAVER_SEARCH_API.to_string(),
            }),
            None => bail!("every search vertical failed"),
        }
    }
}

#[async_trait]
impl TrendSource for NaverClient {
    async fn fetch_trends(
        &self,
        keyword: &str,
        window: TrendWindow,
        today: NaiveDate,
    ) -> Result<TrendSeries> {
        let (id, secret) = self.search_pair()?;
        let start = match window {
            TrendWindow::Monthly => window.dates(today).first().copied().unwrap_or(today),
            TrendWindow::Daily => today - Duration::days(window.points() as i64 - 1),
        };

        let body = json!({
            "startDate": start.format("%Y-%m-%d").to_string(),
            "endDate": today.format("%Y-%m-%d").to_string(),
            "timeUnit": window.time_unit(),
            "keywordGroups": [{ "groupName": keyword, "keywords": [keyword] }],
        });

        let resp = self
            .http
            .post(self.openapi("/v1/datalab/search"))
            .header("X-Naver-Client-Id", &id)
            .header("X-Naver-Client-Secret", &secret)
            .json(&body)
            .send()
            .await
            .context("datalab request failed")?;
        if !resp.status().is_success() {
            bail!("datalab returned {}", resp.status());
        }
        let payload: DatalabResponse = resp.json().await.context("datalab payload malformed")?;

        let points: Vec<TrendSample> = payload
            .results
            .into_iter()
            .next()
            .map(|r| r.data)
            .unwrap_or_default()
            .into_iter()
            .map(|p| TrendSample {
                date: p.period,
                value: (p.ratio.round() as i64).clamp(0, 100),
            })
            .collect();
        if points.is_empty() {
            bail!("datalab returned no data");
        }
        Ok(TrendSeries {
            points,
            source: source_tags::NAVER_DATALAB.to_string(),
        })
    }
}

#[async_trait]
impl RelatedSource for NaverClient {
    fn source(&self) -> &str {
        source_tags::NAVER_AUTOCOMPLETE
    }

    async fn fetch_related(&self, keyword: &str) -> Result<Vec<String>> {
        let resp = self
            .http
            .get(&self.sources.autocomplete_url)
            .query(&[
                ("q", keyword),
                ("con", "1"),
                ("frm", "nv"),
                ("ans", "2"),
                ("r_format", "json"),
                ("st", "100"),
            ])
            .timeout(self.sources.autocomplete_timeout())
            .send()
            .await
            .context("autocomplete request failed")?;
        if !resp.status().is_success() {
            bail!("autocomplete returned {}", resp.status());
        }
        let payload: Value = resp.json().await.context("autocomplete payload malformed")?;
        Ok(parse_autocomplete(&payload))
    }
}

#[async_trait]
impl TagSource for NaverClient {
    fn source(&self) -> &str {
        source_tags::BLOG_CRAWLING
    }

    async fn fetch_page_texts(&self, keyword: &str) -> Result<Vec<String>> {
        let pages = join_all(TAG_PAGES.into_iter().map(|page| async move {
            match self.fetch_page(page, keyword).await {
                Ok(text) => Some(text),
                Err(e) => {
                    warn!(keyword = %keyword, page, error = %e, "tag page failed");
                    None
                }
            }
        }))
        .await;

        let texts: Vec<String> = pages.into_iter().flatten().collect();
        if texts.is_empty() {
            bail!("no tag page could be fetched");
        }
        debug!(keyword = %keyword, pages = texts.len(), "tag pages fetched");
        Ok(texts)
    }
}

fn strip_patterns() -> &'static [Regex; 3] {
    static RES: OnceLock<[Regex; 3]> = OnceLock::new();
    RES.get_or_init(|| {
        [
            Regex::new(r"(?is)<(script|style|noscript)\b.*?</(script|style|noscript)>").expect("static regex"),
            Regex::new(r"(?s)<[^>]*>").expect("static regex"),
            Regex::new(r"&[a-zA-Z#0-9]+;").expect("static regex"),
        ]
    })
}

/// Reduce an HTML page to its visible text, whitespace-collapsed.
pub fn html_to_text(html: &str) -> String {
    let [blocks, tags, entities] = strip_patterns();
    let text = blocks.replace_all(html, " ");
    let text = tags.replace_all(&text, " ");
    let text = entities.replace_all(&text, " ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
