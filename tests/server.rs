//! HTTP API tests driven through `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::NaiveDate;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use keyword_scout::aggregate::Sources;
use keyword_scout::app::AppContext;
use keyword_scout::config::Config;
use keyword_scout::credentials::CredentialStore;
use keyword_scout::server::build_router;
use keyword_scout_core::models::source_tags;
use keyword_scout_core::providers::{
    MetricsSample, MetricsSource, RelatedSource, TagSource, TrendSeries, TrendSource, TrendWindow,
};
use keyword_scout_core::store::memory::InMemoryStore;

/// Vendor that is always down except for autocomplete.
struct Offline;

#[async_trait]
impl MetricsSource for Offline {
    async fn fetch_metrics(&self, _keyword: &str) -> Result<MetricsSample> {
        anyhow::bail!("offline")
    }
}

#[async_trait]
impl TrendSource for Offline {
    async fn fetch_trends(&self, _k: &str, _w: TrendWindow, _t: NaiveDate) -> Result<TrendSeries> {
        anyhow::bail!("offline")
    }
}

#[async_trait]
impl RelatedSource for Offline {
    fn source(&self) -> &str {
        source_tags::NAVER_AUTOCOMPLETE
    }

    async fn fetch_related(&self, keyword: &str) -> Result<Vec<String>> {
        Ok(vec![format!("{keyword} tutorial"), format!("{keyword} book")])
    }
}

#[async_trait]
impl TagSource for Offline {
    fn source(&self) -> &str {
        source_tags::BLOG_CRAWLING
    }

    async fn fetch_page_texts(&self, _keyword: &str) -> Result<Vec<String>> {
        anyhow::bail!("offline")
    }
}

const CONFIG: &str = r#"
[db]
path = "./unused.sqlite"

[server]
bind = "127.0.0.1:0"

[sources]
openapi_url = "http://127.0.0.1:9"
timeout_secs = 1
autocomplete_timeout_secs = 1
"#;

fn app() -> Router {
    let config: Config = toml::from_str(CONFIG).unwrap();
    let offline = Arc::new(Offline);
    let ctx = AppContext::builder(config)
        .store(Arc::new(InMemoryStore::new()))
        .credentials(Arc::new(CredentialStore::empty()))
        .sources(Sources {
            metrics: offline.clone(),
            trends: offline.clone(),
            related: offline.clone(),
            tags: offline,
        })
        .build()
        .unwrap();
    build_router(Arc::new(ctx))
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(v) => builder
            .header("content-type", "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_health() {
    let app = app();
    let (status, body) = call(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_research_returns_composite_report() {
    let app = app();
    let (status, body) = call(
        &app,
        Method::POST,
        "/keywords/research",
        Some(json!({ "keyword": "Rust" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["keyword"], "rust");
    assert_eq!(body["metrics"]["source"], "fallback");
    assert_eq!(body["metrics"]["freshness"], "fresh");
    assert!(body["metrics"]["searchVolume"].as_i64().unwrap() >= 10);
    assert_eq!(body["trends"]["source"], "fallback");
    assert_eq!(body["trends"]["data"].as_array().unwrap().len(), 12);
    assert_eq!(body["relatedTerms"]["terms"][0]["term"], "rust tutorial");
    assert_eq!(body["relatedTerms"]["terms"][0]["relevance"], 1.0);
    assert_eq!(body["tagSuggestions"]["source"], "keyword-analysis");

    let (status, metrics) = call(&app, Method::GET, "/keywords/metrics?keyword=rust", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(metrics["keyword"], "rust");
    assert_eq!(metrics["source"], "fallback");

    let (_, related) = call(&app, Method::GET, "/keywords/related?keyword=RUST", None).await;
    assert_eq!(related.as_array().unwrap().len(), 2);

    let (_, history) = call(&app, Method::GET, "/keywords/history?prefix=ru", None).await;
    assert_eq!(history[0]["keyword"], "rust");
    assert_eq!(history[0]["searchCount"], 1);
}

#[tokio::test]
async fn test_research_rejects_bad_input() {
    let app = app();
    let (status, body) = call(&app, Method::POST, "/keywords/research", Some(json!({ "keyword": "   " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
    assert!(body["error"]["message"].as_str().unwrap().contains("empty"));

    let request = Request::builder()
        .method(Method::POST)
        .uri("/keywords/research")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_query_uses_error_body() {
    let app = app();
    let (status, body) = call(&app, Method::GET, "/keywords/history?limit=abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
    assert!(!body["error"]["message"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_keyword_is_null() {
    let app = app();
    for path in ["metrics", "trends", "related", "tags"] {
        let (status, body) = call(&app, Method::GET, &format!("/keywords/{path}?keyword=nothing"), None).await;
        assert_eq!(status, StatusCode::OK, "{path}");
        assert_eq!(body, Value::Null, "{path}");
    }
    let (status, _) = call(&app, Method::GET, "/keywords/metrics", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_bulk_research_validates_count() {
    let app = app();
    let (status, body) = call(
        &app,
        Method::POST,
        "/keywords/bulk-research",
        Some(json!({ "initialKeyword": "rust", "searchCount": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");

    let (status, body) = call(
        &app,
        Method::POST,
        "/keywords/bulk-research",
        Some(json!({ "initialKeyword": "rust", "searchCount": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalSearched"], 3);
    assert_eq!(body["keywords"][0]["keyword"], "rust");
    assert_eq!(body["keywords"][0]["documentCount"], 0);
    assert!(body["completedAt"].is_string());
}

#[tokio::test]
async fn test_clear_history_and_cache() {
    let app = app();
    call(&app, Method::POST, "/keywords/research", Some(json!({ "keyword": "rust" }))).await;
    call(&app, Method::POST, "/keywords/research", Some(json!({ "keyword": "tokio" }))).await;

    let (_, body) = call(&app, Method::DELETE, "/keywords/cache", None).await;
    assert_eq!(body["removed"], 2);

    let (_, body) = call(&app, Method::DELETE, "/keywords/history?keyword=rust", None).await;
    assert_eq!(body["removed"], 1);
    let (_, body) = call(&app, Method::GET, "/keywords/metrics?keyword=rust", None).await;
    assert_eq!(body, Value::Null);

    let (_, body) = call(&app, Method::DELETE, "/keywords/history", None).await;
    assert_eq!(body["removed"], 1);
}

#[tokio::test]
async fn test_api_key_lifecycle() {
    let app = app();
    let (_, status) = call(&app, Method::GET, "/settings/api-keys", None).await;
    assert_eq!(status["isConfigured"], false);
    assert_eq!(status["clientIdMasked"], "");

    let (code, status) = call(
        &app,
        Method::POST,
        "/settings/api-keys",
        Some(json!({ "clientId": "abcdefghijkl", "clientSecret": "s3cr3t", "customerId": "42" })),
    )
    .await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(status["isConfigured"], true);
    assert_eq!(status["clientIdMasked"], "abcd****ijkl");
    assert_eq!(status["clientSecretMasked"], "******");

    let (_, status) = call(&app, Method::POST, "/settings/api-keys/disconnect", None).await;
    assert_eq!(status["isConfigured"], false);
    assert_eq!(status["hasClientId"], false);

    let (_, check) = call(&app, Method::POST, "/settings/api-keys/test", None).await;
    assert_eq!(check["isValid"], false);
    assert!(check["message"].as_str().unwrap().contains("not configured"));
}
