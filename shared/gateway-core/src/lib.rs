//! Gateway Core - Shared service infrastructure
//!
//! This crate provides:
//! - Lifecycle trait every gateway service implements
//! - Error type shared by the protocol and HTTP surfaces
//! - Process-level configuration

pub mod config;
pub mod error;
pub mod service;

pub use config::ServiceConfig;
pub use error::{GatewayError, Result};
pub use service::{DependencyStatus, GatewayService, HealthStatus, ReadinessStatus, ServiceRuntime};
