//! Delayed single-shot reconfirmation of a breach

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use super::evaluator::{evaluate, ComparisonResult, EvalError};
use super::outcome::{Outcome, OutcomeLog, Stage};
use super::shutdown::ShutdownSignal;
use crate::metrics::{MetricsSource, QueryError, Sample};

/// A pending recheck for one breach
#[derive(Debug, Clone)]
pub struct ReconfirmationTask {
    pub service: String,
    /// The current-value query of the triggering comparison
    pub original_query: String,
    /// Offset sample the breach was measured against
    pub baseline: Sample,
    pub threshold: u32,
    pub due_at: DateTime<Utc>,
}

/// How a recheck ended
#[derive(Debug, Clone, PartialEq)]
pub enum RecheckOutcome {
    /// Still breaching after the cooldown
    Confirmed(ComparisonResult),
    /// Back within threshold
    Recovered(ComparisonResult),
    /// The follow-up query failed; no comparison was made
    QueryFailed(QueryError),
    /// The follow-up sample could not be compared
    Undefined(EvalError),
    /// Shutdown arrived during the cooldown
    Cancelled,
}

impl RecheckOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, RecheckOutcome::Confirmed(_))
    }
}

/// Handle to a spawned recheck
#[derive(Debug)]
pub struct RecheckHandle {
    task: ReconfirmationTask,
    handle: JoinHandle<RecheckOutcome>,
}

impl RecheckHandle {
    pub fn task(&self) -> &ReconfirmationTask {
        &self.task
    }

    /// Wait for the recheck to finish. `None` if it panicked or the runtime shut down.
    pub async fn outcome(self) -> Option<RecheckOutcome> {
        match self.handle.await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                if e.is_panic() {
                    tracing::error!(service = %self.task.service, "Recheck task panicked");
                }
                None
            }
        }
    }
}

/// Spawns rechecks. Each one waits out the cooldown independently of the
/// polling loop and of every other recheck, queries once, and never
/// reschedules itself.
pub struct ReconfirmationScheduler {
    source: Arc<dyn MetricsSource>,
    outcomes: Arc<OutcomeLog>,
    cooldown: Duration,
    shutdown: ShutdownSignal,
    in_flight: Arc<AtomicUsize>,
}

impl ReconfirmationScheduler {
    pub fn new(
        source: Arc<dyn MetricsSource>,
        outcomes: Arc<OutcomeLog>,
        cooldown: Duration,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            source,
            outcomes,
            cooldown,
            shutdown,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Rechecks spawned but not yet finished
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Schedule one recheck of `original_query` against `baseline`
    pub fn schedule_recheck(
        &self,
        baseline: Sample,
        original_query: impl Into<String>,
        service: impl Into<String>,
        threshold: u32,
    ) -> RecheckHandle {
        let cooldown =
            chrono::Duration::from_std(self.cooldown).unwrap_or(chrono::Duration::zero());
        self.schedule(ReconfirmationTask {
            service: service.into(),
            original_query: original_query.into(),
            baseline,
            threshold,
            due_at: Utc::now() + cooldown,
        })
    }

    pub fn schedule(&self, task: ReconfirmationTask) -> RecheckHandle {
        tracing::info!(
            service = %task.service,
            due_at = %task.due_at,
            "Recheck scheduled in {:?}",
            self.cooldown
        );

        let guard = InFlight::enter(&self.in_flight);
        let source = Arc::clone(&self.source);
        let outcomes = Arc::clone(&self.outcomes);
        let shutdown = self.shutdown.clone();
        let cooldown = self.cooldown;
        let spawned = task.clone();

        let handle = tokio::spawn(async move {
            let _guard = guard;
            run_recheck(source.as_ref(), &outcomes, cooldown, shutdown, spawned).await
        });

        RecheckHandle { task, handle }
    }
}

/// Wait out the cooldown, re-sample once and compare against the baseline
pub async fn run_recheck(
    source: &dyn MetricsSource,
    outcomes: &OutcomeLog,
    cooldown: Duration,
    mut shutdown: ShutdownSignal,
    task: ReconfirmationTask,
) -> RecheckOutcome {
    tokio::select! {
        biased;
        _ = shutdown.wait() => {
            tracing::info!(service = %task.service, "Recheck cancelled by shutdown");
            return RecheckOutcome::Cancelled;
        }
        _ = tokio::time::sleep(cooldown) => {}
    }

    let sample = match source.query(&task.original_query).await {
        Ok(sample) => sample,
        Err(e) => {
            tracing::warn!(
                service = %task.service,
                query = %task.original_query,
                error = %e,
                "Recheck query failed"
            );
            return RecheckOutcome::QueryFailed(e);
        }
    };

    match evaluate(task.baseline.value, sample.value, task.threshold) {
        Ok(comparison) => {
            outcomes.record(Outcome::new(
                Stage::Recheck,
                &task.service,
                &task.original_query,
                task.baseline.value,
                sample.value,
                task.threshold,
                comparison,
            ));
            if comparison.is_breach {
                RecheckOutcome::Confirmed(comparison)
            } else {
                RecheckOutcome::Recovered(comparison)
            }
        }
        Err(e) => {
            tracing::warn!(
                service = %task.service,
                query = %task.original_query,
                error = %e,
                "Recheck comparison skipped"
            );
            RecheckOutcome::Undefined(e)
        }
    }
}

struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
