//! Service lifecycle shared by gateway binaries

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

use crate::config::ServiceConfig;
use crate::error::Result;

/// Health status for liveness probes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub service_id: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Readiness status for readiness probes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessStatus {
    pub ready: bool,
    pub dependencies: Vec<DependencyStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyStatus {
    pub name: String,
    pub available: bool,
    pub detail: Option<String>,
}

/// Lifecycle every gateway service implements
#[async_trait]
pub trait GatewayService: Send + Sync + 'static {
    /// Service identifier (e.g., "sgip-gateway")
    fn service_id(&self) -> &'static str;

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    /// Health check - is the service alive?
    async fn health(&self) -> HealthStatus;

    /// Readiness check - are listeners and workers up?
    async fn ready(&self) -> ReadinessStatus;

    async fn shutdown(&self) -> Result<()>;

    /// Start listeners and workers. Returns only on failure or shutdown.
    async fn start(&self) -> Result<()>;
}

/// Runs a service until a shutdown signal or a fatal start error
pub struct ServiceRuntime {
    config: ServiceConfig,
    start_time: std::time::Instant,
}

impl ServiceRuntime {
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            config,
            start_time: std::time::Instant::now(),
        }
    }

    pub async fn run<S: GatewayService>(self, service: Arc<S>) -> Result<()> {
        info!(
            service_id = service.service_id(),
            service_name = %self.config.service_name,
            version = service.version(),
            "Starting service"
        );

        let service_clone = service.clone();
        let mut service_handle = tokio::spawn(async move { service_clone.start().await });

        let outcome = tokio::select! {
            joined = &mut service_handle => match joined {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => {
                    error!("Service failed to start: {}", e);
                    Err(e)
                }
                Err(e) => Err(crate::GatewayError::Internal(format!("service task aborted: {}", e))),
            },
            _ = Self::wait_for_shutdown() => {
                info!("Shutdown signal received, gracefully stopping...");
                Ok(())
            }
        };

        if let Err(e) = service.shutdown().await {
            warn!("Error during shutdown: {}", e);
        }
        service_handle.abort();

        info!(
            uptime_seconds = self.start_time.elapsed().as_secs(),
            "Service stopped"
        );

        outcome
    }

    async fn wait_for_shutdown() {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                }
                Err(e) => {
                    warn!("Failed to listen for SIGTERM: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    }
}
