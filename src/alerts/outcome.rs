//! Comparison outcome reporting

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::evaluator::ComparisonResult;

/// Which comparison produced an outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Current value against an offset value
    Initial,
    /// Delayed re-sample against the original baseline
    Recheck,
}

/// One reported comparison
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    pub stage: Stage,
    pub service: String,
    /// Query that produced the current value
    pub query: String,
    /// Offset in days the baseline was taken at
    pub offset_days: Option<u32>,
    pub baseline: f64,
    pub current: f64,
    pub threshold: u32,
    pub percent_difference: f64,
    pub breach: bool,
    pub recorded_at: DateTime<Utc>,
}

impl Outcome {
    pub fn new(
        stage: Stage,
        service: impl Into<String>,
        query: impl Into<String>,
        baseline: f64,
        current: f64,
        threshold: u32,
        comparison: ComparisonResult,
    ) -> Self {
        Self {
            stage,
            service: service.into(),
            query: query.into(),
            offset_days: None,
            baseline,
            current,
            threshold,
            percent_difference: comparison.percent_difference,
            breach: comparison.is_breach,
            recorded_at: Utc::now(),
        }
    }

    pub fn with_offset(mut self, offset_days: u32) -> Self {
        self.offset_days = Some(offset_days);
        self
    }
}

/// Counters exposed through the status API
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct OutcomeCounts {
    pub comparisons: u64,
    pub breaches: u64,
    pub rechecks: u64,
    pub confirmed: u64,
}

/// Bounded in-memory history of outcomes.
///
/// Recording emits the tracing event for the outcome and keeps the record
/// for the status API. Oldest records are evicted past capacity.
pub struct OutcomeLog {
    entries: RwLock<VecDeque<Outcome>>,
    capacity: usize,
    comparisons: AtomicU64,
    breaches: AtomicU64,
    rechecks: AtomicU64,
    confirmed: AtomicU64,
}

impl OutcomeLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
            comparisons: AtomicU64::new(0),
            breaches: AtomicU64::new(0),
            rechecks: AtomicU64::new(0),
            confirmed: AtomicU64::new(0),
        }
    }

    /// Report an outcome
    pub fn record(&self, outcome: Outcome) {
        match outcome.stage {
            Stage::Initial => {
                self.comparisons.fetch_add(1, Ordering::Relaxed);
                if outcome.breach {
                    self.breaches.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        service = %outcome.service,
                        query = %outcome.query,
                        offset_days = ?outcome.offset_days,
                        percent_difference = outcome.percent_difference,
                        breach = true,
                        "Threshold breached, scheduling recheck"
                    );
                } else {
                    tracing::info!(
                        service = %outcome.service,
                        query = %outcome.query,
                        offset_days = ?outcome.offset_days,
                        percent_difference = outcome.percent_difference,
                        breach = false,
                        "Within threshold"
                    );
                }
            }
            Stage::Recheck => {
                self.rechecks.fetch_add(1, Ordering::Relaxed);
                if outcome.breach {
                    self.confirmed.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        service = %outcome.service,
                        query = %outcome.query,
                        percent_difference = outcome.percent_difference,
                        breach = true,
                        "Recheck confirmed breach"
                    );
                } else {
                    tracing::info!(
                        service = %outcome.service,
                        query = %outcome.query,
                        percent_difference = outcome.percent_difference,
                        breach = false,
                        "Recheck back within threshold"
                    );
                }
            }
        }

        let mut entries = self.entries.write();
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(outcome);
    }

    /// Most recent outcomes, newest first
    pub fn recent(&self, limit: usize) -> Vec<Outcome> {
        let entries = self.entries.read();
        entries.iter().rev().take(limit).cloned().collect()
    }

    /// Recorded outcomes for one service, oldest first
    pub fn for_service(&self, service: &str) -> Vec<Outcome> {
        let entries = self.entries.read();
        entries
            .iter()
            .filter(|o| o.service == service)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn counts(&self) -> OutcomeCounts {
        OutcomeCounts {
            comparisons: self.comparisons.load(Ordering::Relaxed),
            breaches: self.breaches.load(Ordering::Relaxed),
            rechecks: self.rechecks.load(Ordering::Relaxed),
            confirmed: self.confirmed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(service: &str, stage: Stage, breach: bool) -> Outcome {
        Outcome::new(
            stage,
            service,
            "sum(up)",
            100.0,
            90.0,
            10,
            ComparisonResult {
                percent_difference: 10.0,
                is_breach: breach,
            },
        )
    }

    #[test]
    fn test_record_and_recent() {
        let log = OutcomeLog::new(10);
        log.record(outcome("a", Stage::Initial, true));
        log.record(outcome("b", Stage::Initial, false));

        let recent = log.recent(10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].service, "b");
        assert_eq!(recent[1].service, "a");
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let log = OutcomeLog::new(2);
        log.record(outcome("a", Stage::Initial, false));
        log.record(outcome("b", Stage::Initial, false));
        log.record(outcome("c", Stage::Initial, false));

        assert_eq!(log.len(), 2);
        assert!(log.for_service("a").is_empty());
        assert_eq!(log.recent(1)[0].service, "c");
    }

    #[test]
    fn test_counts() {
        let log = OutcomeLog::new(10);
        log.record(outcome("a", Stage::Initial, true));
        log.record(outcome("a", Stage::Initial, false));
        log.record(outcome("a", Stage::Recheck, true));
        log.record(outcome("a", Stage::Recheck, false));

        let counts = log.counts();
        assert_eq!(counts.comparisons, 2);
        assert_eq!(counts.breaches, 1);
        assert_eq!(counts.rechecks, 2);
        assert_eq!(counts.confirmed, 1);
    }
}
