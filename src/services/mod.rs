use tokio::sync::broadcast;

pub mod manager;
pub mod signals;
pub mod web;

#[derive(Debug)]
pub enum ServiceResult {
    GracefulShutdown,
    NormalCompletion,
    Error(anyhow::Error),
}

/// Common trait for all long-running services in the application.
#[async_trait::async_trait]
pub trait Service: Send + Sync {
    /// The name of the service for logging
    fn name(&self) -> &'static str;

    /// Run the service's main work loop
    async fn run(&mut self) -> Result<(), anyhow::Error>;

    /// Gracefully shutdown the service
    async fn shutdown(&mut self) -> Result<(), anyhow::Error>;
}

/// Run a service until it completes on its own or a shutdown signal arrives.
pub async fn run_service(
    mut service: Box<dyn Service>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> ServiceResult {
    let name = service.name();
    tracing::info!(service = name, "service started");

    let completed = tokio::select! {
        result = service.run() => Some(result),
        _ = shutdown_rx.recv() => None,
    };

    match completed {
        Some(Ok(())) => {
            tracing::warn!(service = name, "service completed unexpectedly");
            ServiceResult::NormalCompletion
        }
        Some(Err(e)) => {
            tracing::error!(service = name, error = ?e, "service failed");
            ServiceResult::Error(e)
        }
        None => {
            tracing::info!(service = name, "shutting down service");
            match service.shutdown().await {
                Ok(()) => {
                    tracing::info!(service = name, "service shutdown completed");
                    ServiceResult::GracefulShutdown
                }
                Err(e) => {
                    tracing::error!(service = name, error = ?e, "service shutdown failed");
                    ServiceResult::Error(e)
                }
            }
        }
    }
}
