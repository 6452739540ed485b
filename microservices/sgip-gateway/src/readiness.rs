//! Readiness shared by the service lifecycle and the `/ready` probe

use gateway_core::{DependencyStatus, ReadinessStatus};
use parking_lot::Mutex;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::inbound::InboundServer;

/// Listener state plus submit worker liveness
#[derive(Clone)]
pub struct GatewayReadiness {
    inbound: InboundServer,
    workers: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl GatewayReadiness {
    pub fn new(inbound: InboundServer) -> Self {
        Self {
            inbound,
            workers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn track_workers(&self, handles: impl IntoIterator<Item = JoinHandle<()>>) {
        self.workers.lock().extend(handles);
    }

    pub fn abort_workers(&self) {
        for handle in self.workers.lock().drain(..) {
            handle.abort();
        }
    }

    pub fn status(&self) -> ReadinessStatus {
        let listener_up = self.inbound.is_running();
        let metrics = self.inbound.metrics();
        let (alive, total) = {
            let workers = self.workers.lock();
            (workers.iter().filter(|h| !h.is_finished()).count(), workers.len())
        };

        ReadinessStatus {
            ready: listener_up && alive > 0,
            dependencies: vec![
                DependencyStatus {
                    name: "sgip_listener".to_string(),
                    available: listener_up,
                    detail: Some(format!(
                        "accepted={} rejected={} active={} frames={}",
                        metrics.connections_total.load(Ordering::Relaxed),
                        metrics.connections_rejected.load(Ordering::Relaxed),
                        metrics.connections_active.load(Ordering::Relaxed),
                        metrics.frames_received.load(Ordering::Relaxed),
                    )),
                },
                DependencyStatus {
                    name: "submit_workers".to_string(),
                    available: alive > 0,
                    detail: Some(format!("{}/{} running", alive, total)),
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::Notifier;
    use sgip_proto::SgipConfig;

    fn readiness() -> GatewayReadiness {
        let (notifier, _rx) = Notifier::channel();
        GatewayReadiness::new(InboundServer::new(&SgipConfig::default(), notifier).unwrap())
    }

    #[tokio::test]
    async fn test_not_ready_before_listener_and_workers() {
        let status = readiness().status();
        assert!(!status.ready);
        assert_eq!(status.dependencies.len(), 2);
        assert!(status.dependencies.iter().all(|d| !d.available));
    }

    #[tokio::test]
    async fn test_worker_liveness_counted() {
        let readiness = readiness();
        readiness.track_workers(vec![tokio::spawn(std::future::pending::<()>())]);

        let workers = &readiness.status().dependencies[1];
        assert!(workers.available);
        assert_eq!(workers.detail.as_deref(), Some("1/1 running"));

        readiness.abort_workers();
        let workers = &readiness.status().dependencies[1];
        assert!(!workers.available);
        assert_eq!(workers.detail.as_deref(), Some("0/0 running"));
    }
}
