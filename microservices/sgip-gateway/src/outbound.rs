//! Outbound worker pool: a fixed set of workers, each holding at most one
//! bound session to the SMG, fed from a shared bounded queue.

use gateway_core::GatewayError;
use sgip_proto::codec::{Bind, Encode, ResultResp, Submit, SubmitRequest};
use sgip_proto::{login_type, CommandId, SequenceGenerator, SgipConfig, SgipError};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

/// Total send attempts per submission, the first included
pub const SUBMIT_ATTEMPTS: u32 = 2;

const LENGTH_PREFIX: usize = 4;

/// One submission waiting for a worker
#[derive(Debug)]
pub struct SubmissionJob {
    pub request: SubmitRequest,
    reply: JobReply,
}

impl SubmissionJob {
    pub fn new(request: SubmitRequest) -> (Self, SubmitHandle) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                request,
                reply: JobReply { tx },
            },
            SubmitHandle { rx },
        )
    }

    /// Split off the reply slot so the request can be moved into the submit.
    pub fn into_parts(self) -> (SubmitRequest, JobReply) {
        (self.request, self.reply)
    }
}

/// Worker's side of the per-job rendezvous
#[derive(Debug)]
pub struct JobReply {
    tx: oneshot::Sender<String>,
}

impl JobReply {
    /// Hand the outcome back to the submitter. An empty string is failure.
    pub fn resolve(self, sequence: String) {
        if self.tx.send(sequence).is_err() {
            debug!("Submitter went away before the result was ready");
        }
    }
}

/// Submitter's side of the per-job rendezvous
#[derive(Debug)]
pub struct SubmitHandle {
    rx: oneshot::Receiver<String>,
}

impl SubmitHandle {
    /// Sequence token on success, empty on failure or if the job was dropped.
    pub async fn wait(self) -> String {
        self.rx.await.unwrap_or_default()
    }
}

/// Producer side of the bounded job queue
#[derive(Debug, Clone)]
pub struct SubmitQueue {
    tx: mpsc::Sender<SubmissionJob>,
}

impl SubmitQueue {
    pub fn bounded(depth: usize) -> (Self, JobReceiver) {
        let (tx, rx) = mpsc::channel(depth.max(1));
        (
            Self { tx },
            JobReceiver {
                rx: Arc::new(Mutex::new(rx)),
            },
        )
    }

    /// Waits for queue space when the queue is full.
    pub async fn enqueue(&self, request: SubmitRequest) -> Result<SubmitHandle, GatewayError> {
        let (job, handle) = SubmissionJob::new(request);
        self.tx
            .send(job)
            .await
            .map_err(|_| GatewayError::Unavailable("Submission workers are not running".to_string()))?;
        Ok(handle)
    }

    pub fn capacity(&self) -> usize {
        self.tx.capacity()
    }
}

/// Consumer side shared by all workers; each job goes to exactly one of them.
#[derive(Debug, Clone)]
pub struct JobReceiver {
    rx: Arc<Mutex<mpsc::Receiver<SubmissionJob>>>,
}

impl JobReceiver {
    pub async fn recv(&self) -> Option<SubmissionJob> {
        self.rx.lock().await.recv().await
    }
}

#[derive(Debug, Clone)]
pub struct OutboundSettings {
    pub peer_address: String,
    pub login_name: String,
    pub login_password: String,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
}

impl From<&SgipConfig> for OutboundSettings {
    fn from(config: &SgipConfig) -> Self {
        Self {
            peer_address: config.peer_address(),
            login_name: config.identity.login_name.clone(),
            login_password: config.identity.login_password.clone(),
            read_timeout: config.read_timeout(),
            write_timeout: config.write_timeout(),
        }
    }
}

/// A bound TCP session to the SMG
#[derive(Debug)]
pub struct OutboundSession {
    stream: TcpStream,
    settings: Arc<OutboundSettings>,
}

impl OutboundSession {
    /// Connect and bind. Any deviation from a clean Bind_Resp is a failure.
    #[instrument(skip(settings, sequences), fields(peer = %settings.peer_address))]
    pub async fn establish(
        settings: Arc<OutboundSettings>,
        sequences: &SequenceGenerator,
    ) -> Result<Self, SgipError> {
        let stream = timeout(settings.write_timeout, TcpStream::connect(&settings.peer_address))
            .await
            .map_err(|_| SgipError::Timeout)??;
        let _ = stream.set_nodelay(true);

        let mut session = Self { stream, settings };
        let bind = Bind::new(
            sequences.next(),
            login_type::SP_TO_SMG,
            &session.settings.login_name,
            &session.settings.login_password,
        );
        debug!("snd packet: {}", bind);
        session.exchange(&bind.encode(), CommandId::BindResp).await?;
        info!("Outbound session bound");
        Ok(session)
    }

    /// Send one request frame and require a successful fixed-size acknowledgement.
    pub async fn exchange(&mut self, frame: &[u8], expected: CommandId) -> Result<ResultResp, SgipError> {
        let write_timeout = self.settings.write_timeout;
        let read_timeout = self.settings.read_timeout;

        timeout(write_timeout, async {
            self.stream.write_all(frame).await?;
            self.stream.flush().await
        })
        .await
        .map_err(|_| SgipError::Timeout)??;
        debug!(bytes = %hex::encode_upper(frame), "snd");

        let mut response = [0u8; ResultResp::LEN];
        timeout(read_timeout, self.stream.read_exact(&mut response[..LENGTH_PREFIX]))
            .await
            .map_err(|_| SgipError::Timeout)??;
        let length = u32::from_be_bytes([response[0], response[1], response[2], response[3]]);
        if length as usize != ResultResp::LEN {
            return Err(SgipError::UnexpectedResponse(format!(
                "response length {} instead of {}",
                length,
                ResultResp::LEN
            )));
        }
        timeout(read_timeout, self.stream.read_exact(&mut response[LENGTH_PREFIX..]))
            .await
            .map_err(|_| SgipError::Timeout)??;
        debug!(bytes = %hex::encode_upper(response), "rcv");

        ResultResp::expect_ack(&response, expected)
    }

    pub async fn close(&mut self) {
        let _ = self.stream.shutdown().await;
    }
}

/// Sequential job loop with its own lazily established session
pub struct OutboundWorker {
    id: usize,
    settings: Arc<OutboundSettings>,
    sequences: Arc<SequenceGenerator>,
    session: Option<OutboundSession>,
}

impl OutboundWorker {
    pub fn new(id: usize, settings: Arc<OutboundSettings>, sequences: Arc<SequenceGenerator>) -> Self {
        Self {
            id,
            settings,
            sequences,
            session: None,
        }
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    pub async fn run(mut self, jobs: JobReceiver) {
        info!(worker = self.id, "Submit worker started");
        while let Some(job) = jobs.recv().await {
            let (request, reply) = job.into_parts();
            reply.resolve(self.process(request).await);
        }
        if let Some(mut session) = self.session.take() {
            session.close().await;
        }
        info!(worker = self.id, "Submit worker stopped");
    }

    /// Submit one request; returns the sequence token or an empty string.
    #[instrument(skip(self, request), fields(worker = self.id))]
    pub async fn process(&mut self, request: SubmitRequest) -> String {
        let mut session = match self.session.take() {
            Some(session) => session,
            None => match OutboundSession::establish(self.settings.clone(), &self.sequences).await {
                Ok(session) => session,
                Err(e) => {
                    error!("Handshake failed: {}", e);
                    return String::new();
                }
            },
        };

        let submit = Submit::new(self.sequences.next(), request);
        let sequence = submit.sequence();
        let frame = submit.encode();
        debug!("snd packet: {}", submit);

        for attempt in 1..=SUBMIT_ATTEMPTS {
            match session.exchange(&frame, CommandId::SubmitResp).await {
                Ok(_) => {
                    self.session = Some(session);
                    info!(sequence = %sequence, attempt, "Submit accepted");
                    return sequence.to_string();
                }
                Err(e) => {
                    warn!(sequence = %sequence, attempt, "Submit failed: {}", e);
                    session.close().await;
                    if attempt == SUBMIT_ATTEMPTS {
                        break;
                    }
                    session = match OutboundSession::establish(self.settings.clone(), &self.sequences).await {
                        Ok(session) => session,
                        Err(e) => {
                            error!("Reconnect failed: {}", e);
                            return String::new();
                        }
                    };
                }
            }
        }

        error!(sequence = %sequence, "Submit abandoned after {} attempts", SUBMIT_ATTEMPTS);
        String::new()
    }
}

/// Starts the workers and returns the producer handle for the HTTP layer
pub struct OutboundPool;

impl OutboundPool {
    pub fn spawn(config: &SgipConfig, sequences: Arc<SequenceGenerator>) -> (SubmitQueue, Vec<JoinHandle<()>>) {
        let settings = Arc::new(OutboundSettings::from(config));
        let (queue, jobs) = SubmitQueue::bounded(config.client.queue_depth);

        let handles = (0..config.client.worker_count)
            .map(|id| {
                let worker = OutboundWorker::new(id, settings.clone(), sequences.clone());
                tokio::spawn(worker.run(jobs.clone()))
            })
            .collect();

        info!(
            workers = config.client.worker_count,
            queue_depth = config.client.queue_depth,
            peer = %settings.peer_address,
            "Submit workers started"
        );
        (queue, handles)
    }
}
