//! Rollbar Prometheus exporter.
//!
//! Periodically pulls projects, items and occurrence aggregates from the
//! Rollbar API and republishes them as Prometheus series. The scrape loop
//! runs as one background task; the `/metrics` and `/healthz` endpoints are
//! served concurrently and read the same registry the scraper writes.
//!
//! # Architecture
//!
//! - [`rollbar`]: API client, data-model contract, occurrence query
//!   translation
//! - [`scrape`]: scheduling loop, project filter, per-project credential
//!   cache with failure-driven eviction
//! - [`metrics`]: the exported series and their aggregation semantics
//! - [`server`]: exposition and health endpoints
//! - [`config`]: environment-variable configuration

pub mod config;
pub mod metrics;
pub mod rollbar;
pub mod scrape;
pub mod server;

pub use config::{Cli, ConfigError, Settings};
pub use metrics::ExporterMetrics;
pub use rollbar::{ApiError, RollbarClient};
pub use scrape::{ProjectFilter, Scraper};
