//! Fire-and-forget HTTP notification for inbound Deliver and Report

use serde::Serialize;
use sgip_proto::codec::{Deliver, Report};
use sgip_proto::config::CallbackConfig;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Fields of an accepted Deliver, as sent to the deliver callback
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliverNotification {
    pub user_number: String,
    pub sp_number: String,
    pub tppid: String,
    pub tpudhi: String,
    pub msg_coding: String,
    pub msg_content: String,
    pub reserve: String,
}

/// Fields of an accepted Report, as sent to the report callback
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportNotification {
    pub submit_seq: String,
    pub report_type: String,
    pub user_number: String,
    pub state: String,
    pub error_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Deliver(DeliverNotification),
    Report(ReportNotification),
}

impl From<&Deliver> for DeliverNotification {
    fn from(m: &Deliver) -> Self {
        Self {
            user_number: m.user_number.clone(),
            sp_number: m.sp_number.clone(),
            tppid: format!("{:02X}", m.tppid),
            tpudhi: format!("{:02X}", m.tpudhi),
            msg_coding: format!("{:02X}", m.msg_coding),
            msg_content: hex::encode_upper(&m.msg_content),
            reserve: m.reserved.to_hex(),
        }
    }
}

impl From<&Report> for ReportNotification {
    fn from(m: &Report) -> Self {
        Self {
            submit_seq: hex::encode_upper(m.submit_sequence),
            report_type: format!("{:02X}", m.report_type),
            user_number: m.user_number.clone(),
            state: format!("{:02X}", m.state),
            error_code: format!("{:02X}", m.error_code),
        }
    }
}

/// Handle used on the protocol path. Never blocks.
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl Notifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn notify(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            warn!("Notification dispatcher is gone, dropping notification");
        }
    }
}

/// Drains notifications and delivers each one with a single HTTP GET
pub struct NotificationDispatcher {
    client: reqwest::Client,
    deliver_url: String,
    report_url: String,
    rx: mpsc::UnboundedReceiver<Notification>,
}

impl NotificationDispatcher {
    pub fn new(
        callbacks: &CallbackConfig,
        rx: mpsc::UnboundedReceiver<Notification>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });

        Self {
            client,
            deliver_url: callbacks.deliver_url.clone(),
            report_url: callbacks.report_url.clone(),
            rx,
        }
    }

    pub async fn run(mut self) {
        info!(
            deliver_url = %self.deliver_url,
            report_url = %self.report_url,
            "Notification dispatcher started"
        );

        while let Some(notification) = self.rx.recv().await {
            let url = match &notification {
                Notification::Deliver(_) => self.deliver_url.clone(),
                Notification::Report(_) => self.report_url.clone(),
            };
            if url.is_empty() {
                debug!(?notification, "No callback configured, dropping notification");
                continue;
            }

            let client = self.client.clone();
            tokio::spawn(async move {
                if let Err(e) = deliver(&client, &url, &notification).await {
                    error!(url = %url, "Callback error: {}", e);
                }
            });
        }

        info!("Notification dispatcher stopped");
    }
}

async fn deliver(
    client: &reqwest::Client,
    url: &str,
    notification: &Notification,
) -> Result<(), reqwest::Error> {
    let request = client.get(url);
    let request = match notification {
        Notification::Deliver(fields) => request.query(fields),
        Notification::Report(fields) => request.query(fields),
    };

    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;
    info!(url = %url, status = %status, body = %body, "Callback response");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Query, State};
    use axum::routing::get;
    use axum::Router;
    use sgip_proto::MessageSequence;
    use std::collections::HashMap;

    type Captured = mpsc::UnboundedSender<(String, HashMap<String, String>)>;

    async fn capture_server() -> (String, mpsc::UnboundedReceiver<(String, HashMap<String, String>)>) {
        let (tx, rx) = mpsc::unbounded_channel();

        async fn deliver(State(tx): State<Captured>, Query(q): Query<HashMap<String, String>>) -> &'static str {
            let _ = tx.send(("deliver".to_string(), q));
            "ok"
        }
        async fn report(State(tx): State<Captured>, Query(q): Query<HashMap<String, String>>) -> &'static str {
            let _ = tx.send(("report".to_string(), q));
            "ok"
        }

        let app = Router::new()
            .route("/deliver", get(deliver))
            .route("/report", get(report))
            .with_state(tx);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), rx)
    }

    #[test]
    fn test_deliver_fields_are_hex_rendered() {
        let deliver = Deliver::new(MessageSequence::new(1, 2, 3), "8613800000001", "10655", 0, 1, 8, vec![0x4F, 0x60]);
        let n = DeliverNotification::from(&deliver);
        assert_eq!(n.tpudhi, "01");
        assert_eq!(n.msg_coding, "08");
        assert_eq!(n.msg_content, "4F60");
        assert_eq!(n.reserve, "0000000000000000");
    }

    #[test]
    fn test_report_submit_seq_matches_sequence_token() {
        let submit_seq = MessageSequence::new(3_020_012_345, 1_016_093_000, 42);
        let report = Report::new(MessageSequence::new(1, 2, 3), submit_seq, 0, "8613800000001", 2, 0x1F);
        let n = ReportNotification::from(&report);
        assert_eq!(n.submit_seq, submit_seq.to_string());
        assert_eq!(n.state, "02");
        assert_eq!(n.error_code, "1F");
    }

    #[tokio::test]
    async fn test_dispatcher_routes_to_callbacks() {
        let (base, mut captured) = capture_server().await;
        let callbacks = CallbackConfig {
            deliver_url: format!("{}/deliver", base),
            report_url: format!("{}/report", base),
        };
        let (notifier, rx) = Notifier::channel();
        tokio::spawn(NotificationDispatcher::new(&callbacks, rx, Duration::from_secs(5)).run());

        let deliver = Deliver::new(MessageSequence::new(1, 2, 3), "8613800000001", "10655", 0, 0, 15, b"hi".to_vec());
        notifier.notify(Notification::Deliver((&deliver).into()));

        let (route, query) = tokio::time::timeout(Duration::from_secs(5), captured.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(route, "deliver");
        assert_eq!(query["userNumber"], "8613800000001");
        assert_eq!(query["spNumber"], "10655");
        assert_eq!(query["msgCoding"], "0F");
        assert_eq!(query["msgContent"], "6869");

        let report = Report::new(MessageSequence::new(1, 2, 4), MessageSequence::new(7, 8, 9), 1, "8613800000001", 0, 0);
        notifier.notify(Notification::Report((&report).into()));

        let (route, query) = tokio::time::timeout(Duration::from_secs(5), captured.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(route, "report");
        assert_eq!(query["submitSeq"], "000000070000000800000009");
        assert_eq!(query["reportType"], "01");
    }

    #[tokio::test]
    async fn test_notify_after_dispatcher_dropped_does_not_panic() {
        let (notifier, rx) = Notifier::channel();
        drop(rx);
        let report = Report::default();
        notifier.notify(Notification::Report((&report).into()));
    }
}
