//! Rollbar API layer.
//!
//! Thin, typed access to the remote API this exporter scrapes:
//!
//! - [`RollbarClient`]: authenticated JSON envelope calls with fixed
//!   timeouts and page/limit pagination
//! - [`types`]: the remote data-model contract, consumed as-is
//! - [`OccurrenceQuery`] / [`flatten_occurrences`]: the time-windowed
//!   aggregation query and its bucketed-response translation

mod client;
mod error;
mod query;
pub mod types;

pub use client::{RollbarClient, DEFAULT_BASE_URL};
pub use error::ApiError;
pub use query::{flatten_occurrences, OccurrenceQuery};
