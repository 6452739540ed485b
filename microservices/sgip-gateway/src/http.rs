//! HTTP submission endpoint

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{ConnectInfo, RawQuery, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use gateway_core::{GatewayError, ReadinessStatus};
use serde::{Deserialize, Serialize};
use sgip_proto::codec::{width, SubmitRequest};
use sgip_proto::{MessageSequence, SgipConfig};
use std::net::{IpAddr, SocketAddr};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::outbound::SubmitQueue;
use crate::readiness::GatewayReadiness;

pub const SUBMIT_OK: u8 = 0;
pub const SUBMIT_ERR: u8 = 1;

/// JSON body returned for every submit call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub result: u8,
    pub sequence: String,
}

impl SubmitResponse {
    pub fn failed() -> Self {
        Self {
            result: SUBMIT_ERR,
            sequence: String::new(),
        }
    }

    /// Anything other than a full sequence token counts as failure.
    pub fn from_sequence(sequence: String) -> Self {
        let result = if sequence.len() == MessageSequence::LEN * 2 {
            SUBMIT_OK
        } else {
            SUBMIT_ERR
        };
        Self { result, sequence }
    }
}

#[derive(Clone)]
pub struct HttpState {
    queue: SubmitQueue,
    allowed_ip: IpAddr,
    readiness: GatewayReadiness,
}

impl HttpState {
    pub fn new(
        queue: SubmitQueue,
        config: &SgipConfig,
        readiness: GatewayReadiness,
    ) -> Result<Self, GatewayError> {
        let allowed_ip = config.http.allowed_ip.parse().map_err(|e| {
            GatewayError::Config(format!("Invalid submitter ip {}: {}", config.http.allowed_ip, e))
        })?;
        Ok(Self {
            queue,
            allowed_ip,
            readiness,
        })
    }
}

pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/submit", get(submit).post(submit))
        .route("/health", get(|| async { "OK" }))
        .route("/ready", get(ready))
        .with_state(state)
}

/// Serve until the listener fails
pub async fn serve(listener: TcpListener, state: HttpState) -> Result<(), GatewayError> {
    info!(address = ?listener.local_addr().ok(), "HTTP submit endpoint listening");
    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

async fn ready(State(state): State<HttpState>) -> (StatusCode, Json<ReadinessStatus>) {
    let status = state.readiness.status();
    let code = if status.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(status))
}

async fn submit(
    State(state): State<HttpState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    method: Method,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Result<Bytes, BytesRejection>,
) -> Json<SubmitResponse> {
    info!(remote = %remote, method = %method, query = ?query, "Submit request");

    if remote.ip() != state.allowed_ip {
        let e = GatewayError::Forbidden(format!("submitter {} is not allowed", remote.ip()));
        warn!(error_code = e.error_code(), "{}", e);
        return Json(SubmitResponse::failed());
    }

    let pairs = match form_pairs(&method, &headers, query.as_deref(), body) {
        Ok(pairs) => pairs,
        Err(e) => {
            warn!(error_code = e.error_code(), "Submit request is unreadable: {}", e);
            return Json(SubmitResponse::failed());
        }
    };

    let request = match parse_submit(&pairs) {
        Ok(request) => request,
        Err(e) => {
            warn!(error_code = e.error_code(), "Submit request is invalid: {}", e);
            return Json(SubmitResponse::failed());
        }
    };

    let handle = match state.queue.enqueue(request).await {
        Ok(handle) => handle,
        Err(e) => {
            warn!(error_code = e.error_code(), "{}", e);
            return Json(SubmitResponse::failed());
        }
    };

    let response = SubmitResponse::from_sequence(handle.wait().await);
    info!(result = response.result, sequence = %response.sequence, "Submit finished");
    Json(response)
}

/// Form fields of a request: a urlencoded POST body first, then the query string.
/// Bodies of any other content type are ignored.
pub fn form_pairs(
    method: &Method,
    headers: &HeaderMap,
    query: Option<&str>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Vec<(String, String)>, GatewayError> {
    let mut pairs = Vec::new();

    let urlencoded = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false);
    if *method != Method::GET && urlencoded {
        let body = body.map_err(|e| GatewayError::Validation(format!("body: {}", e)))?;
        pairs = serde_urlencoded::from_bytes::<Vec<(String, String)>>(&body)
            .map_err(|e| GatewayError::Validation(format!("body: {}", e)))?;
    }

    if let Some(query) = query {
        let from_query = serde_urlencoded::from_str::<Vec<(String, String)>>(query)
            .map_err(|e| GatewayError::Validation(format!("query: {}", e)))?;
        pairs.extend(from_query);
    }

    Ok(pairs)
}

/// Field lookup over decoded form pairs. The first occurrence of a name wins.
struct FormFields<'a> {
    pairs: &'a [(String, String)],
}

impl<'a> FormFields<'a> {
    fn first(&self, name: &str) -> Option<&'a str> {
        self.pairs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn all(&self, name: &str) -> Vec<String> {
        self.pairs
            .iter()
            .filter(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
            .collect()
    }

    fn text(&self, name: &str) -> Result<String, GatewayError> {
        match self.first(name) {
            Some(value) if !value.is_empty() => Ok(value.to_string()),
            _ => Err(GatewayError::Validation(format!("no {}", name))),
        }
    }

    fn byte(&self, name: &str) -> Result<u8, GatewayError> {
        let value = self.text(name)?;
        u8::from_str_radix(&value, 16)
            .map_err(|_| GatewayError::Validation(format!("{} format is error", name)))
    }

    fn hex(&self, name: &str) -> Result<Vec<u8>, GatewayError> {
        let value = self.text(name)?;
        hex::decode(&value).map_err(|_| GatewayError::Validation(format!("{} format is error", name)))
    }
}

/// Convert submitted form fields into a typed submission.
pub fn parse_submit(pairs: &[(String, String)]) -> Result<SubmitRequest, GatewayError> {
    let form = FormFields { pairs };

    let user_numbers = form.all("userNumber");
    if user_numbers.is_empty() {
        return Err(GatewayError::Validation("no userNumber".to_string()));
    }

    let reserve: [u8; width::RESERVED] = form
        .hex("reserve")?
        .try_into()
        .map_err(|_| GatewayError::Validation("reserve format is error".to_string()))?;

    Ok(SubmitRequest {
        sp_number: form.text("spNumber")?,
        charge_number: form.first("chargeNumber").unwrap_or_default().to_string(),
        user_numbers,
        corp_id: form.text("corpId")?,
        service_type: form.text("serviceType")?,
        fee_type: form.byte("feeType")?,
        fee_value: form.text("feeValue")?,
        given_value: form.text("givenValue")?,
        agent_flag: form.byte("agentFlag")?,
        mt_flag: form.byte("mtFlag")?,
        priority: form.byte("priority")?,
        expire_time: form.text("expireTime")?,
        schedule_time: form.text("scheduleTime")?,
        report_flag: form.byte("reportFlag")?,
        tppid: form.byte("tppid")?,
        tpudhi: form.byte("tpudhi")?,
        msg_coding: form.byte("msgCoding")?,
        msg_content: form.hex("msgContent")?,
        reserve,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_form() -> Vec<(String, String)> {
        [
            ("spNumber", "10655"),
            ("chargeNumber", "000000000000000000000"),
            ("userNumber", "8613800000001"),
            ("userNumber", "8613800000002"),
            ("corpId", "12345"),
            ("serviceType", "TEST"),
            ("feeType", "1"),
            ("feeValue", "0"),
            ("givenValue", "0"),
            ("agentFlag", "0"),
            ("mtFlag", "2"),
            ("priority", "9"),
            ("expireTime", "x"),
            ("scheduleTime", "y"),
            ("reportFlag", "1"),
            ("tppid", "0"),
            ("tpudhi", "0"),
            ("msgCoding", "0F"),
            ("msgContent", "4F60597D"),
            ("reserve", "0102030405060708"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    fn without(name: &str) -> Vec<(String, String)> {
        valid_form().into_iter().filter(|(k, _)| k != name).collect()
    }

    fn with(name: &str, value: &str) -> Vec<(String, String)> {
        valid_form()
            .into_iter()
            .map(|(k, v)| if k == name { (k, value.to_string()) } else { (k, v) })
            .collect()
    }

    #[test]
    fn test_parse_valid_submission() {
        let request = parse_submit(&valid_form()).unwrap();
        assert_eq!(request.sp_number, "10655");
        assert_eq!(request.user_numbers, vec!["8613800000001", "8613800000002"]);
        assert_eq!(request.msg_coding, 0x0F);
        assert_eq!(request.msg_content, vec![0x4F, 0x60, 0x59, 0x7D]);
        assert_eq!(request.reserve, [1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_charge_number_is_optional() {
        let request = parse_submit(&without("chargeNumber")).unwrap();
        assert_eq!(request.charge_number, "");
    }

    #[test]
    fn test_missing_required_fields_rejected() {
        for name in ["spNumber", "userNumber", "corpId", "feeType", "msgContent", "reserve"] {
            let err = parse_submit(&without(name)).unwrap_err();
            assert!(matches!(err, GatewayError::Validation(_)), "{}", name);
        }
        assert!(parse_submit(&with("serviceType", "")).is_err());
    }

    #[test]
    fn test_malformed_values_rejected() {
        assert!(parse_submit(&with("priority", "1FF")).is_err());
        assert!(parse_submit(&with("tppid", "zz")).is_err());
        assert!(parse_submit(&with("msgContent", "ABC")).is_err());
        assert!(parse_submit(&with("reserve", "01020304")).is_err());
    }

    fn form_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            "application/x-www-form-urlencoded".parse().unwrap(),
        );
        headers
    }

    #[test]
    fn test_form_body_precedes_query() {
        let body = Ok(Bytes::from_static(b"spNumber=10655&userNumber=861"));
        let pairs = form_pairs(&Method::POST, &form_headers(), Some("spNumber=1&userNumber=862"), body).unwrap();

        let form = FormFields { pairs: &pairs };
        assert_eq!(form.first("spNumber"), Some("10655"));
        assert_eq!(form.all("userNumber"), vec!["861", "862"]);
    }

    #[test]
    fn test_body_without_form_content_type_is_ignored() {
        let body = Ok(Bytes::from_static(b"spNumber=10655"));
        let pairs = form_pairs(&Method::POST, &HeaderMap::new(), Some("corpId=1"), body).unwrap();
        assert_eq!(pairs, vec![("corpId".to_string(), "1".to_string())]);

        let body = Ok(Bytes::from_static(b"spNumber=10655"));
        let pairs = form_pairs(&Method::GET, &form_headers(), None, body).unwrap();
        assert!(pairs.is_empty());
    }

    #[test]
    fn test_response_result_follows_sequence_length() {
        let ok = SubmitResponse::from_sequence("0".repeat(24));
        assert_eq!(ok.result, SUBMIT_OK);
        assert_eq!(SubmitResponse::from_sequence(String::new()).result, SUBMIT_ERR);
        assert_eq!(
            serde_json::to_string(&SubmitResponse::failed()).unwrap(),
            r#"{"result":1,"sequence":""}"#
        );
    }
}
