//! Process wiring: load services, start the monitor and the status API

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::alerts::{shutdown_channel, OutcomeLog, ReconfirmationScheduler, ServiceMonitor};
use crate::api::{self, AppState};
use crate::config::{MonitorConfig, ServiceSet};
use crate::metrics::{MetricsClient, MetricsSource};

/// Run until CTRL+C or SIGTERM
pub async fn run(config: MonitorConfig) -> Result<(), Box<dyn std::error::Error>> {
    let services = Arc::new(ServiceSet::load(&config.services_path)?);
    tracing::info!(
        "Loaded {} services from {} ({} monitored)",
        services.len(),
        config.services_path,
        services.monitored().count()
    );

    let source: Arc<dyn MetricsSource> = Arc::new(MetricsClient::from_config(&config)?);
    let outcomes = Arc::new(OutcomeLog::new(config.outcome_history));
    let (trigger, signal) = shutdown_channel();

    let scheduler = Arc::new(ReconfirmationScheduler::new(
        Arc::clone(&source),
        Arc::clone(&outcomes),
        config.recheck_cooldown,
        signal.clone(),
    ));
    let monitor = Arc::new(ServiceMonitor::new(
        services,
        source,
        Arc::clone(&scheduler),
        Arc::clone(&outcomes),
        config.poll_interval,
        config.max_concurrency,
    ));

    let monitor_handle = tokio::spawn(Arc::clone(&monitor).run(signal.clone()));

    let api_handle = config.port.map(|port| {
        let state = Arc::new(AppState {
            monitor: Arc::clone(&monitor),
            outcomes: Arc::clone(&outcomes),
        });
        let host = config.host.clone();
        let signal = signal.clone();
        tokio::spawn(async move {
            if let Err(e) = api::serve(&host, port, state, signal).await {
                tracing::error!(error = %e, "Status API failed");
            }
        })
    });

    wait_for_shutdown().await;
    tracing::info!("Shutdown signal received, stopping monitor...");
    trigger.trigger();

    join_logged("Monitor", monitor_handle).await;
    if let Some(handle) = api_handle {
        join_logged("Status API", handle).await;
    }

    tracing::info!(
        rechecks_abandoned = scheduler.in_flight(),
        "promwatch stopped"
    );
    Ok(())
}

/// Wait for a background task, logging a panic or cancellation. `true` if it ran to completion.
async fn join_logged(task: &str, handle: JoinHandle<()>) -> bool {
    match handle.await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(task, error = %e, "{} task failed", task);
            false
        }
    }
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
