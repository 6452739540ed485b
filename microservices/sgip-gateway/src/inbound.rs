//! Inbound SGIP server: the SMG connects to us with Bind, then sends
//! Deliver and Report until it Unbinds.

use bytes::BytesMut;
use sgip_proto::codec::{
    Bind, Deliver, Encode, InboundKind, InboundMessage, Report, Response, ResultResp, UnbindResp,
    PREAMBLE_LEN,
};
use sgip_proto::{login_type, CommandId, ResultCode, SgipConfig, SgipError};
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::notify::{Notification, Notifier};

/// Per-connection protocol state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Init,
    Bound,
    Closed,
}

/// Credentials and deadlines shared by every inbound connection
#[derive(Debug, Clone)]
pub struct InboundSettings {
    pub login_name: String,
    pub login_password: String,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
}

impl From<&SgipConfig> for InboundSettings {
    fn from(config: &SgipConfig) -> Self {
        Self {
            login_name: config.identity.login_name.clone(),
            login_password: config.identity.login_password.clone(),
            read_timeout: config.read_timeout(),
            write_timeout: config.write_timeout(),
        }
    }
}

#[derive(Debug, Default)]
pub struct InboundMetrics {
    pub connections_total: AtomicU64,
    pub connections_rejected: AtomicU64,
    pub connections_active: AtomicU64,
    pub frames_received: AtomicU64,
}

/// Listener that accepts the configured peer only
#[derive(Clone)]
pub struct InboundServer {
    listen_address: String,
    allowed_peer: IpAddr,
    settings: Arc<InboundSettings>,
    notifier: Notifier,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    metrics: Arc<InboundMetrics>,
}

impl InboundServer {
    pub fn new(config: &SgipConfig, notifier: Notifier) -> Result<Self, SgipError> {
        Ok(Self {
            listen_address: format!("0.0.0.0:{}", config.server.listen_port),
            allowed_peer: config.peer_ip()?,
            settings: Arc::new(InboundSettings::from(config)),
            notifier,
            running: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(Notify::new()),
            metrics: Arc::new(InboundMetrics::default()),
        })
    }

    pub fn with_listen_address(mut self, address: impl Into<String>) -> Self {
        self.listen_address = address.into();
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn metrics(&self) -> &InboundMetrics {
        &self.metrics
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.notify_waiters();
        info!("SGIP listener stopping");
    }

    /// Failing to bind is the one unrecoverable inbound error.
    pub async fn bind(&self) -> Result<TcpListener, SgipError> {
        let listener = TcpListener::bind(&self.listen_address).await.map_err(|e| {
            error!(address = %self.listen_address, "SGIP listen error: {}", e);
            SgipError::Io(e)
        })?;
        info!(address = %self.listen_address, allowed_peer = %self.allowed_peer, "SGIP server listening");
        Ok(listener)
    }

    pub async fn run(&self) -> Result<(), SgipError> {
        let listener = self.bind().await?;
        self.serve(listener).await;
        Ok(())
    }

    pub async fn serve(&self, listener: TcpListener) {
        self.running.store(true, Ordering::SeqCst);

        while self.running.load(Ordering::SeqCst) {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((socket, addr)) => self.accept(socket, addr),
                        Err(e) => error!("Accept error: {}", e),
                    }
                }
                _ = self.shutdown.notified() => break,
            }
        }

        self.running.store(false, Ordering::SeqCst);
    }

    fn accept(&self, socket: tokio::net::TcpStream, addr: SocketAddr) {
        self.metrics.connections_total.fetch_add(1, Ordering::Relaxed);
        info!(peer = %addr, "Connected");

        if addr.ip() != self.allowed_peer {
            info!(peer = %addr, "Connection not allowed");
            self.metrics.connections_rejected.fetch_add(1, Ordering::Relaxed);
            drop(socket);
            return;
        }

        self.metrics.connections_active.fetch_add(1, Ordering::Relaxed);
        let session = InboundSession::new(
            socket,
            addr.to_string(),
            self.settings.clone(),
            self.notifier.clone(),
        );
        let metrics = self.metrics.clone();

        tokio::spawn(async move {
            match session.run_with_metrics(&metrics).await {
                Ok(()) => info!(peer = %addr, "Connection closed after unbind"),
                Err(e) => warn!(peer = %addr, "Connection torn down: {}", e),
            }
            metrics.connections_active.fetch_sub(1, Ordering::Relaxed);
        });
    }
}

/// One accepted connection, processed strictly one request at a time
pub struct InboundSession<S> {
    stream: S,
    peer: String,
    state: ConnectionState,
    settings: Arc<InboundSettings>,
    notifier: Notifier,
}

impl<S> InboundSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, peer: String, settings: Arc<InboundSettings>, notifier: Notifier) -> Self {
        Self {
            stream,
            peer,
            state: ConnectionState::Init,
            settings,
            notifier,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Serve until Unbind (`Ok`) or the first framing, I/O or deadline fault (`Err`).
    pub async fn run(self) -> Result<(), SgipError> {
        self.run_with_metrics(&InboundMetrics::default()).await
    }

    async fn run_with_metrics(mut self, metrics: &InboundMetrics) -> Result<(), SgipError> {
        loop {
            let (kind, frame) = self.read_frame().await?;
            metrics.frames_received.fetch_add(1, Ordering::Relaxed);

            let message = match kind.decode(&frame) {
                Ok(message) => message,
                Err(partial) => {
                    warn!(peer = %self.peer, error = %partial.error, "Packet decode error, processing partial fields");
                    partial.partial
                }
            };
            debug!(peer = %self.peer, "rcv packet: {}", message);

            let response = self.process(message);
            debug!(peer = %self.peer, "snd packet: {}", response);
            self.write_response(&response).await?;

            if self.state == ConnectionState::Closed {
                let _ = self.stream.shutdown().await;
                return Ok(());
            }
        }
    }

    async fn read_frame(&mut self) -> Result<(InboundKind, BytesMut), SgipError> {
        let read_timeout = self.settings.read_timeout;

        let mut preamble = [0u8; PREAMBLE_LEN];
        timeout(read_timeout, self.stream.read_exact(&mut preamble))
            .await
            .map_err(|_| SgipError::Timeout)??;
        debug!(peer = %self.peer, bytes = %hex::encode_upper(preamble), "rcv");

        let length = u32::from_be_bytes([preamble[0], preamble[1], preamble[2], preamble[3]]);
        let command = u32::from_be_bytes([preamble[4], preamble[5], preamble[6], preamble[7]]);
        let kind = InboundKind::judge(command, length)?;

        let mut frame = BytesMut::zeroed(length as usize);
        frame[..PREAMBLE_LEN].copy_from_slice(&preamble);
        timeout(read_timeout, self.stream.read_exact(&mut frame[PREAMBLE_LEN..]))
            .await
            .map_err(|_| SgipError::Timeout)??;
        debug!(peer = %self.peer, bytes = %hex::encode_upper(&frame[PREAMBLE_LEN..]), "rcv");

        Ok((kind, frame))
    }

    async fn write_response(&mut self, response: &Response) -> Result<(), SgipError> {
        let bytes = response.encode();
        timeout(self.settings.write_timeout, async {
            self.stream.write_all(&bytes).await?;
            self.stream.flush().await
        })
        .await
        .map_err(|_| SgipError::Timeout)??;
        debug!(peer = %self.peer, bytes = %hex::encode_upper(&bytes), "snd");
        Ok(())
    }

    /// Apply one request to the connection state and build its response.
    pub fn process(&mut self, message: InboundMessage) -> Response {
        match message {
            InboundMessage::Bind(bind) => Response::Bind(self.on_bind(&bind)),
            InboundMessage::Unbind(unbind) => {
                self.transition(ConnectionState::Closed);
                Response::Unbind(UnbindResp::new(unbind.header.sequence))
            }
            InboundMessage::Deliver(deliver) => Response::Deliver(self.on_deliver(&deliver)),
            InboundMessage::Report(report) => Response::Report(self.on_report(&report)),
        }
    }

    fn on_bind(&mut self, bind: &Bind) -> ResultResp {
        self.transition(ConnectionState::Init);

        let result = if bind.login_type != login_type::SMG_TO_SP {
            warn!(peer = %self.peer, login_type = bind.login_type, "Bind with wrong login type");
            ResultCode::LoginTypeError
        } else if bind.login_name != self.settings.login_name
            || bind.login_password != self.settings.login_password
        {
            warn!(peer = %self.peer, login_name = %bind.login_name, "Bind with bad credentials");
            ResultCode::LoginError
        } else {
            self.transition(ConnectionState::Bound);
            ResultCode::Ok
        };

        ResultResp::new(CommandId::BindResp, bind.header.sequence, result.as_u8())
    }

    fn on_deliver(&mut self, deliver: &Deliver) -> ResultResp {
        let result = self.require_bound();
        if result == ResultCode::Ok {
            self.notifier.notify(Notification::Deliver(deliver.into()));
        }
        ResultResp::new(CommandId::DeliverResp, deliver.header.sequence, result.as_u8())
    }

    fn on_report(&mut self, report: &Report) -> ResultResp {
        let result = self.require_bound();
        if result == ResultCode::Ok {
            self.notifier.notify(Notification::Report(report.into()));
        }
        ResultResp::new(CommandId::ReportResp, report.header.sequence, result.as_u8())
    }

    fn require_bound(&self) -> ResultCode {
        if self.state == ConnectionState::Bound {
            ResultCode::Ok
        } else {
            warn!(peer = %self.peer, state = ?self.state, "Event before successful bind");
            ResultCode::ParameterError
        }
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state != next {
            info!(peer = %self.peer, from = ?self.state, to = ?next, "Connection state change");
            self.state = next;
        }
    }
}
