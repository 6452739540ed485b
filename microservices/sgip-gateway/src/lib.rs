//! SGIP Gateway - SP-side gateway to an SMS gateway (SMG)
//!
//! Capabilities:
//! - Inbound SGIP server for Deliver and Report from the SMG
//! - Outbound worker pool submitting over persistent bound sessions
//! - HTTP submit endpoint and HTTP callbacks for inbound events

pub mod http;
pub mod inbound;
pub mod notify;
pub mod outbound;
pub mod readiness;
pub mod service;

pub use http::{parse_submit, HttpState, SubmitResponse};
pub use inbound::{ConnectionState, InboundServer, InboundSession, InboundSettings};
pub use notify::{Notification, NotificationDispatcher, Notifier};
pub use outbound::{OutboundPool, OutboundSession, OutboundSettings, OutboundWorker, SubmitHandle, SubmitQueue};
pub use readiness::GatewayReadiness;
pub use service::SgipGatewayService;
