//! HTTP server with scheduler lifecycle.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::{router, CronTaskService};

/// Run the HTTP server with scheduler integration and graceful shutdown.
///
/// This function:
/// 1. Schedules every stored configuration
/// 2. Serves the task configuration routes on `addr`
/// 3. Serves until `shutdown_signal` resolves
/// 4. Shuts the scheduler down, waiting for running jobs
pub async fn run_server_with_shutdown<F>(
    addr: SocketAddr,
    service: Arc<CronTaskService>,
    shutdown_signal: F,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!("Starting HTTP server on {}", addr);

    let scheduled = service.schedule_all()?;
    info!(scheduled, "Scheduler started");

    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server ready on {}", listener.local_addr()?);

    axum::serve(listener, router(service.clone()))
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("HTTP server shutdown, stopping scheduler...");
    if let Err(e) = service.scheduler().shutdown().await {
        warn!(error = %e, "Scheduler shutdown failed");
    }

    info!("Server shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use cron_scheduler::{
        AutocompleteValidators, ConfigurationValidator, CronJobScheduler, EventBus,
        FieldTypeValidators, JobKindRegistry, SchedulerConfig,
    };
    use cron_storage::MemoryTaskStore;
    use tokio::sync::oneshot;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_shutdown_stops_scheduler() {
        let kinds = Arc::new(JobKindRegistry::new());
        let validator = ConfigurationValidator::new(
            kinds.clone(),
            FieldTypeValidators::new(),
            AutocompleteValidators::new(),
        )
        .unwrap();
        let scheduler =
            CronJobScheduler::new(SchedulerConfig::default(), kinds, Arc::new(EventBus::new())).unwrap();
        let store = Arc::new(MemoryTaskStore::new());
        let service = Arc::new(CronTaskService::new(
            store.clone(),
            store,
            Arc::new(validator),
            Arc::new(scheduler),
        ));

        let (tx, rx) = oneshot::channel::<()>();
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let server = tokio::spawn(run_server_with_shutdown(addr, service.clone(), async {
            let _ = rx.await;
        }));

        tx.send(()).unwrap();
        server.await.unwrap().unwrap();
        assert!(!service.scheduler().is_running());
    }
}
