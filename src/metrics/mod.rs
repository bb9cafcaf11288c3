//! Metrics backend access
//!
//! Builds query expressions, runs them against a Prometheus-compatible
//! instant-query API and decodes the first series into a [`Sample`].

pub mod client;
#[cfg(test)]
pub mod fake;
pub mod query;
pub mod response;

pub use client::{MetricsClient, MetricsSource, QueryError};
pub use query::{current_query, offset_query};
pub use response::{parse_body, Sample};
