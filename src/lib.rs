//! # Keyword Scout
//!
//! Keyword research backend: for a seed keyword it gathers search volume
//! and competition, a trend series, related terms and tag suggestions from
//! several sources, stores them with freshness tracking, and serves a
//! composite report over HTTP and the `kscout` CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌─────────────┐   ┌───────────┐
//! │ Naver APIs   │──▶│ Aggregator  │──▶│ Refresher │──▶ SQLite
//! │ + synthetic  │   │ (settle-all)│   │ (per key) │
//! └──────────────┘   └─────────────┘   └─────┬─────┘
//!                                            │
//!                          ┌─────────────────┤
//!                          ▼                 ▼
//!                     ┌──────────┐     ┌──────────┐
//!                     │   CLI    │     │   HTTP   │
//!                     │ (kscout) │     │  (axum)  │
//!                     └──────────┘     └──────────┘
//! ```
//!
//! Runtime-free logic (models, scoring, freshness policy, tag extraction,
//! synthetic data, the store trait) lives in `keyword-scout-core`.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`credentials`] | Vendor credential store |
//! | [`naver`] | Naver search, DataLab, autocomplete and page sources |
//! | [`aggregate`] | Per-category fetch with timeouts and fallbacks |
//! | [`refresh`] | Per-key serialized refresh, inline and queued dispatch |
//! | [`research`] | Research service and report assembly |
//! | [`bulk`] | Breadth-first bulk research |
//! | [`app`] | Component wiring |
//! | [`server`] | HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite-backed `KeywordStore` |

pub mod aggregate;
pub mod app;
pub mod bulk;
pub mod config;
pub mod credentials;
pub mod db;
pub mod error;
pub mod migrate;
pub mod naver;
pub mod refresh;
pub mod research;
pub mod server;
pub mod sqlite_store;
