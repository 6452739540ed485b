//! Shared fixtures for gateway integration tests

#![allow(dead_code)]

use sgip_gateway::InboundSettings;
use sgip_proto::codec::{Encode, MessageHeader, ResultResp, UnbindResp, HEADER_LEN};
use sgip_proto::{CommandId, MessageSequence, SgipConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

pub const LOGIN_NAME: &str = "smg";
pub const LOGIN_PASSWORD: &str = "secret";

pub fn inbound_settings() -> Arc<InboundSettings> {
    Arc::new(InboundSettings {
        login_name: LOGIN_NAME.to_string(),
        login_password: LOGIN_PASSWORD.to_string(),
        read_timeout: Duration::from_secs(2),
        write_timeout: Duration::from_secs(2),
    })
}

pub fn seq(counter: u32) -> MessageSequence {
    MessageSequence::new(3_020_000_001, 1_016_120_000, counter)
}

/// Read one whole frame using its length prefix
pub async fn read_frame<R: AsyncRead + Unpin>(stream: &mut R) -> std::io::Result<Vec<u8>> {
    let mut prefix = [0u8; 4];
    stream.read_exact(&mut prefix).await?;
    let length = u32::from_be_bytes(prefix) as usize;
    let mut frame = vec![0u8; length];
    frame[..4].copy_from_slice(&prefix);
    stream.read_exact(&mut frame[4..]).await?;
    Ok(frame)
}

/// Gateway config pointing at a local peer
pub fn config_for(port: u16, workers: usize, depth: usize) -> SgipConfig {
    let mut config = SgipConfig::default();
    config.peer.ip = "127.0.0.1".to_string();
    config.peer.port = port;
    config.peer.read_timeout_secs = 2;
    config.peer.write_timeout_secs = 2;
    config.client.worker_count = workers;
    config.client.queue_depth = depth;
    config.identity.login_name = "sp".to_string();
    config.identity.login_password = "pw".to_string();
    config
}

/// Scripted SMG accepting outbound sessions
pub struct FakeSmg {
    pub port: u16,
    pub connections: Arc<AtomicUsize>,
    pub binds: Arc<AtomicUsize>,
    pub submits: Arc<Mutex<Vec<MessageSequence>>>,
    drop_submits: Arc<AtomicUsize>,
}

impl FakeSmg {
    /// `bind_result` answers every Bind; the first `drop_submits` Submits
    /// are answered by closing the connection instead.
    pub async fn start(bind_result: u8, drop_submits: usize) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let smg = Self {
            port,
            connections: Arc::new(AtomicUsize::new(0)),
            binds: Arc::new(AtomicUsize::new(0)),
            submits: Arc::new(Mutex::new(Vec::new())),
            drop_submits: Arc::new(AtomicUsize::new(drop_submits)),
        };

        let connections = smg.connections.clone();
        let binds = smg.binds.clone();
        let submits = smg.submits.clone();
        let drops = smg.drop_submits.clone();
        tokio::spawn(async move {
            loop {
                let (mut socket, _) = match listener.accept().await {
                    Ok(accepted) => accepted,
                    Err(_) => return,
                };
                connections.fetch_add(1, Ordering::SeqCst);
                let binds = binds.clone();
                let submits = submits.clone();
                let drops = drops.clone();

                tokio::spawn(async move {
                    while let Ok(frame) = read_frame(&mut socket).await {
                        let header = MessageHeader::decode(&frame[..HEADER_LEN]).unwrap();
                        let reply = match header.command_id() {
                            Some(CommandId::Bind) => {
                                binds.fetch_add(1, Ordering::SeqCst);
                                ResultResp::new(CommandId::BindResp, header.sequence, bind_result).encode()
                            }
                            Some(CommandId::Submit) => {
                                submits.lock().await.push(header.sequence);
                                if drops
                                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                                    .is_ok()
                                {
                                    return;
                                }
                                ResultResp::new(CommandId::SubmitResp, header.sequence, 0).encode()
                            }
                            Some(CommandId::Unbind) => {
                                let _ = socket.write_all(&UnbindResp::new(header.sequence).encode()).await;
                                return;
                            }
                            _ => return,
                        };
                        if socket.write_all(&reply).await.is_err() {
                            return;
                        }
                    }
                });
            }
        });

        smg
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub async fn submitted(&self) -> Vec<MessageSequence> {
        self.submits.lock().await.clone()
    }
}
