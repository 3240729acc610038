//! # Keyword Scout Core
//!
//! Shared, runtime-free logic for Keyword Scout: data models, the freshness
//! and cache policy, metric scoring, related-term ranking, tag extraction,
//! synthetic fallback generators, data-source traits, and the store
//! abstraction.
//!
//! This crate contains no tokio, sqlx, HTTP client, or filesystem I/O. The
//! root `keyword-scout` crate supplies the SQLite store, the vendor HTTP
//! sources, and the server.

pub mod clock;
pub mod freshness;
pub mod models;
pub mod providers;
pub mod related;
pub mod report;
pub mod scoring;
pub mod store;
pub mod synthetic;
pub mod tags;
