//! promwatch: historical-offset threshold monitor
//!
//! Periodically samples a Prometheus-compatible backend, compares each
//! service's current aggregate with the same aggregate at one or more offsets
//! in the past, and flags a breach when the percent difference reaches the
//! configured threshold. Every breach gets exactly one delayed recheck.
//!
//! # Features
//!
//! - **Offset Comparisons**: `aggregate(expr)` against `aggregate(expr offset Nd)`
//! - **Reconfirmation**: single-shot recheck after a cooldown
//! - **Bounded Fan-out**: services evaluated concurrently under a semaphore
//! - **Status API**: optional HTTP view of services and recent outcomes
//!
//! # Example
//!
//! ```no_run
//! use promwatch::alerts::evaluate;
//!
//! let result = evaluate(100.0, 90.0, 10).unwrap();
//! assert!(result.is_breach);
//! assert_eq!(result.percent_difference, 10.0);
//! ```

pub mod alerts;
pub mod api;
pub mod app;
pub mod config;
pub mod metrics;

// Re-export commonly used types
pub use alerts::{evaluate, ComparisonResult, EvalError, ServiceMonitor};
pub use config::{MonitorConfig, ServiceSet, ServiceSpec};
pub use metrics::{MetricsClient, MetricsSource, QueryError, Sample};
