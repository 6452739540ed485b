//! Wires the listener, worker pool, dispatcher and HTTP endpoint into one service

use async_trait::async_trait;
use gateway_core::{GatewayError, GatewayService, HealthStatus, ReadinessStatus, Result};
use parking_lot::Mutex;
use sgip_proto::{SequenceGenerator, SgipConfig};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::info;

use crate::http::{self, HttpState};
use crate::inbound::InboundServer;
use crate::notify::{Notification, NotificationDispatcher, Notifier};
use crate::outbound::OutboundPool;
use crate::readiness::GatewayReadiness;

pub struct SgipGatewayService {
    config: SgipConfig,
    sequences: Arc<SequenceGenerator>,
    inbound: InboundServer,
    notifications: Mutex<Option<UnboundedReceiver<Notification>>>,
    readiness: GatewayReadiness,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    start_time: Instant,
}

impl SgipGatewayService {
    pub fn new(config: SgipConfig) -> Result<Self> {
        config.validate()?;

        let sequences = Arc::new(SequenceGenerator::from_identity(&config.identity));
        let (notifier, notifications) = Notifier::channel();
        let inbound = InboundServer::new(&config, notifier)?;

        info!(
            node_id = sequences.node_id(),
            peer = %config.peer_address(),
            "Initializing SGIP gateway"
        );

        let readiness = GatewayReadiness::new(inbound.clone());

        Ok(Self {
            config,
            sequences,
            inbound,
            readiness,
            notifications: Mutex::new(Some(notifications)),
            tasks: Mutex::new(Vec::new()),
            start_time: Instant::now(),
        })
    }

    pub fn sequences(&self) -> &Arc<SequenceGenerator> {
        &self.sequences
    }
}

#[async_trait]
impl GatewayService for SgipGatewayService {
    fn service_id(&self) -> &'static str {
        "sgip-gateway"
    }

    async fn health(&self) -> HealthStatus {
        HealthStatus {
            healthy: true,
            service_id: self.service_id().to_string(),
            version: self.version().to_string(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    async fn ready(&self) -> ReadinessStatus {
        self.readiness.status()
    }

    async fn shutdown(&self) -> Result<()> {
        info!("Shutting down SGIP gateway");
        self.inbound.stop();
        self.readiness.abort_workers();
        for handle in self.tasks.lock().drain(..) {
            handle.abort();
        }
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        let notifications = self
            .notifications
            .lock()
            .take()
            .ok_or_else(|| GatewayError::Internal("service already started".to_string()))?;
        let dispatcher =
            NotificationDispatcher::new(&self.config.callbacks, notifications, self.config.read_timeout());
        self.tasks.lock().push(tokio::spawn(dispatcher.run()));

        let (queue, workers) = OutboundPool::spawn(&self.config, self.sequences.clone());
        self.readiness.track_workers(workers);
        let state = HttpState::new(queue, &self.config, self.readiness.clone())?;

        let listener = self.inbound.bind().await?;
        let inbound = self.inbound.clone();
        self.tasks
            .lock()
            .push(tokio::spawn(async move { inbound.serve(listener).await }));

        let http_address = format!("0.0.0.0:{}", self.config.http.listen_port);
        let http_listener = TcpListener::bind(&http_address).await?;
        info!(
            sgip_port = self.config.server.listen_port,
            http_addr = %http_address,
            "SGIP gateway started"
        );

        http::serve(http_listener, state).await
    }
}
