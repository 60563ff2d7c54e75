use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::services::{Service, ServiceResult, run_service};

/// Manages multiple services and their lifecycle
pub struct ServiceManager {
    registered_services: HashMap<String, Box<dyn Service>>,
    running_services: HashMap<String, JoinHandle<ServiceResult>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Default for ServiceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceManager {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            registered_services: HashMap::new(),
            running_services: HashMap::new(),
            shutdown_tx,
        }
    }

    /// Register a service to be managed (not yet spawned)
    pub fn register_service(&mut self, name: &str, service: Box<dyn Service>) {
        self.registered_services.insert(name.to_string(), service);
    }

    /// Check if there are any registered services
    pub fn has_services(&self) -> bool {
        !self.registered_services.is_empty()
    }

    /// Spawn all registered services
    pub fn spawn_all(&mut self) {
        let service_count = self.registered_services.len();
        let service_names: Vec<_> = self.registered_services.keys().cloned().collect();

        for (name, service) in self.registered_services.drain() {
            let shutdown_rx = self.shutdown_tx.subscribe();
            let handle = tokio::spawn(run_service(service, shutdown_rx));
            trace!(service = %name, id = ?handle.id(), "service spawned");
            self.running_services.insert(name, handle);
        }

        info!(
            service_count,
            services = ?service_names,
            "spawned {} services",
            service_count
        );
    }

    /// Wait until any running service exits and report which one.
    ///
    /// Pends forever when nothing is running.
    pub async fn run(&mut self) -> (String, ServiceResult) {
        if self.running_services.is_empty() {
            return std::future::pending().await;
        }

        let (names, handles): (Vec<String>, Vec<JoinHandle<ServiceResult>>) =
            self.running_services.drain().unzip();
        let (result, index, remaining) = futures::future::select_all(handles).await;

        for (i, handle) in remaining.into_iter().enumerate() {
            let original = if i < index { i } else { i + 1 };
            self.running_services.insert(names[original].clone(), handle);
        }

        let name = names[index].clone();
        let result = match result {
            Ok(result) => result,
            Err(e) => ServiceResult::Error(anyhow::anyhow!("service task panicked: {e}")),
        };
        (name, result)
    }

    /// Signal every running service to stop and wait up to `timeout` for them.
    ///
    /// Returns the elapsed time, or the names of services that did not finish.
    pub async fn shutdown(&mut self, timeout: Duration) -> Result<Duration, Vec<String>> {
        let service_count = self.running_services.len();
        info!(service_count, timeout = ?timeout, "shutting down services");

        let start = Instant::now();
        let _ = self.shutdown_tx.send(());

        let mut pending = Vec::new();
        for (name, handle) in self.running_services.drain() {
            let remaining = timeout.saturating_sub(start.elapsed());
            match tokio::time::timeout(remaining, handle).await {
                Ok(Ok(ServiceResult::Error(e))) => {
                    warn!(service = %name, error = ?e, "service reported error during shutdown");
                }
                Ok(Ok(result)) => debug!(service = %name, result = ?result, "service stopped"),
                Ok(Err(e)) => warn!(service = %name, error = ?e, "service task panicked"),
                Err(_) => {
                    warn!(service = %name, "service did not stop in time");
                    pending.push(name);
                }
            }
        }

        if pending.is_empty() {
            Ok(start.elapsed())
        } else {
            Err(pending)
        }
    }
}
