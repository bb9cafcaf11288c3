//! Polling loop over the configured services

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio::time::{interval, MissedTickBehavior};

use super::evaluator::{evaluate, ComparisonResult, EvalError};
use super::outcome::{Outcome, OutcomeLog, Stage};
use super::recheck::{RecheckHandle, ReconfirmationScheduler};
use super::shutdown::ShutdownSignal;
use crate::config::{ServiceSet, ServiceSpec};
use crate::metrics::{current_query, offset_query, MetricsSource, QueryError, Sample};

/// Why an offset produced no comparison
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OffsetSkip {
    #[error("offset query failed: {0}")]
    Query(#[from] QueryError),

    #[error("comparison undefined: {0}")]
    Comparison(#[from] EvalError),
}

/// Result of one offset comparison
#[derive(Debug)]
pub struct OffsetReport {
    pub offset_days: u32,
    pub query: String,
    pub result: Result<ComparisonResult, OffsetSkip>,
}

impl OffsetReport {
    pub fn is_breach(&self) -> bool {
        matches!(&self.result, Ok(cmp) if cmp.is_breach)
    }
}

/// Everything one service evaluation produced in a tick
#[derive(Debug)]
pub struct ServiceReport {
    pub service: String,
    pub query: String,
    pub current: Result<Sample, QueryError>,
    pub offsets: Vec<OffsetReport>,
    /// One handle per breaching offset
    pub rechecks: Vec<RecheckHandle>,
}

impl ServiceReport {
    pub fn breaches(&self) -> usize {
        self.offsets.iter().filter(|o| o.is_breach()).count()
    }

    pub fn offset(&self, days: u32) -> Option<&OffsetReport> {
        self.offsets.iter().find(|o| o.offset_days == days)
    }
}

/// Periodically compares every service against its historical offsets
pub struct ServiceMonitor {
    services: Arc<ServiceSet>,
    source: Arc<dyn MetricsSource>,
    scheduler: Arc<ReconfirmationScheduler>,
    outcomes: Arc<OutcomeLog>,
    poll_interval: Duration,
    limiter: Arc<Semaphore>,
    ticks: AtomicU64,
    /// Services with an evaluation spawned by the loop and not yet finished
    busy: Mutex<HashSet<String>>,
}

/// Clears a service's busy mark when its spawned evaluation ends or is dropped
struct BusyGuard {
    monitor: Arc<ServiceMonitor>,
    service: String,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.monitor.busy.lock().remove(&self.service);
    }
}

impl ServiceMonitor {
    pub fn new(
        services: Arc<ServiceSet>,
        source: Arc<dyn MetricsSource>,
        scheduler: Arc<ReconfirmationScheduler>,
        outcomes: Arc<OutcomeLog>,
        poll_interval: Duration,
        max_concurrency: usize,
    ) -> Self {
        for spec in services.iter().filter(|s| !s.is_monitored()) {
            tracing::warn!(
                service = %spec.name,
                source = ?spec.source,
                "Unsupported source, service skipped"
            );
        }

        Self {
            services,
            source,
            scheduler,
            outcomes,
            poll_interval,
            limiter: Arc::new(Semaphore::new(max_concurrency.max(1))),
            ticks: AtomicU64::new(0),
            busy: Mutex::new(HashSet::new()),
        }
    }

    pub fn services(&self) -> &Arc<ServiceSet> {
        &self.services
    }

    pub fn scheduler(&self) -> &Arc<ReconfirmationScheduler> {
        &self.scheduler
    }

    /// Number of polling ticks dispatched so far
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Run the polling loop until `shutdown` fires.
    ///
    /// The first tick is immediate. Each tick dispatches every service whose
    /// previous evaluation has finished and returns to the ticker without
    /// waiting for the evaluations.
    pub async fn run(self: Arc<Self>, mut shutdown: ShutdownSignal) {
        tracing::info!(
            services = self.services.monitored().count(),
            "Service monitor started with interval {:?}",
            self.poll_interval
        );

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut in_progress: JoinSet<ServiceReport> = JoinSet::new();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    while let Some(result) = in_progress.try_join_next() {
                        Self::finish(result);
                    }
                    Self::dispatch_tick(&self, &mut in_progress);
                }
                _ = shutdown.wait() => {
                    tracing::info!("Service monitor shutting down");
                    break;
                }
            }
        }

        while let Some(result) = in_progress.join_next().await {
            Self::finish(result);
        }

        tracing::info!(
            rechecks_in_flight = self.scheduler.in_flight(),
            "Service monitor stopped"
        );
    }

    /// Spawn one evaluation per idle service, returns how many were spawned
    fn dispatch_tick(monitor: &Arc<Self>, in_progress: &mut JoinSet<ServiceReport>) -> usize {
        let tick = monitor.ticks.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(tick, pending = in_progress.len(), "Polling tick");

        let mut dispatched = 0;
        for spec in monitor.services.monitored() {
            if !monitor.busy.lock().insert(spec.name.clone()) {
                tracing::warn!(
                    service = %spec.name,
                    tick,
                    "Previous evaluation still running, skipping this tick"
                );
                continue;
            }

            let guard = BusyGuard {
                monitor: Arc::clone(monitor),
                service: spec.name.clone(),
            };
            let spec = spec.clone();
            in_progress.spawn(async move {
                let report = guard.monitor.evaluate_bounded(&spec).await;
                drop(guard);
                report
            });
            dispatched += 1;
        }
        dispatched
    }

    fn finish(result: Result<ServiceReport, JoinError>) {
        match result {
            Ok(report) => {
                tracing::debug!(
                    service = %report.service,
                    offsets = report.offsets.len(),
                    breaches = report.breaches(),
                    "Service evaluation finished"
                );
            }
            Err(e) if e.is_panic() => {
                tracing::error!(error = %e, "Service evaluation panicked");
            }
            Err(_) => {}
        }
    }

    async fn evaluate_bounded(&self, spec: &ServiceSpec) -> ServiceReport {
        let _permit = Arc::clone(&self.limiter).acquire_owned().await.ok();
        self.evaluate_service(spec).await
    }

    /// Evaluate every monitored service once, concurrently
    pub async fn tick_once(&self) -> Vec<ServiceReport> {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        let evaluations = self
            .services
            .monitored()
            .map(|spec| self.evaluate_bounded(spec));
        futures::future::join_all(evaluations).await
    }

    /// Compare one service's current value against each of its offsets
    pub async fn evaluate_service(&self, spec: &ServiceSpec) -> ServiceReport {
        let query = current_query(&spec.aggregate, &spec.query);
        tracing::info!(service = %spec.name, query = %query, "Querying current value");

        let current = match self.source.query(&query).await {
            Ok(sample) => sample,
            Err(e) => {
                if e.is_empty_result() {
                    tracing::info!(
                        service = %spec.name,
                        query = %query,
                        "No current data, skipping"
                    );
                } else {
                    tracing::error!(
                        service = %spec.name,
                        query = %query,
                        error = %e,
                        "Current value query failed"
                    );
                }
                return ServiceReport {
                    service: spec.name.clone(),
                    query,
                    current: Err(e),
                    offsets: Vec::new(),
                    rechecks: Vec::new(),
                };
            }
        };

        let comparisons = spec
            .offsets
            .iter()
            .map(|&days| self.compare_offset(spec, &query, current, days));
        let (offsets, rechecks): (Vec<_>, Vec<_>) =
            futures::future::join_all(comparisons).await.into_iter().unzip();

        ServiceReport {
            service: spec.name.clone(),
            query,
            current: Ok(current),
            offsets,
            rechecks: rechecks.into_iter().flatten().collect(),
        }
    }

    async fn compare_offset(
        &self,
        spec: &ServiceSpec,
        current_query: &str,
        current: Sample,
        offset_days: u32,
    ) -> (OffsetReport, Option<RecheckHandle>) {
        let query = offset_query(&spec.aggregate, &spec.query, offset_days);

        let baseline = match self.source.query(&query).await {
            Ok(sample) => sample,
            Err(e) => {
                tracing::warn!(
                    service = %spec.name,
                    query = %query,
                    error = %e,
                    "Offset query failed"
                );
                let report = OffsetReport {
                    offset_days,
                    query,
                    result: Err(e.into()),
                };
                return (report, None);
            }
        };

        let comparison = match evaluate(baseline.value, current.value, spec.threshold) {
            Ok(comparison) => comparison,
            Err(e) => {
                tracing::warn!(
                    service = %spec.name,
                    query = %query,
                    error = %e,
                    "Comparison skipped"
                );
                let report = OffsetReport {
                    offset_days,
                    query,
                    result: Err(e.into()),
                };
                return (report, None);
            }
        };

        self.outcomes.record(
            Outcome::new(
                Stage::Initial,
                &spec.name,
                current_query,
                baseline.value,
                current.value,
                spec.threshold,
                comparison,
            )
            .with_offset(offset_days),
        );

        let recheck = comparison.is_breach.then(|| {
            self.scheduler
                .schedule_recheck(baseline, current_query, &spec.name, spec.threshold)
        });

        let report = OffsetReport {
            offset_days,
            query,
            result: Ok(comparison),
        };
        (report, recheck)
    }
}
