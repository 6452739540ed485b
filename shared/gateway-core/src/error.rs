//! Error types for gateway services

use sgip_proto::SgipError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Authorization error: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Forbidden(_) => 403,
            Self::Unavailable(_) => 503,
            Self::Timeout(_) => 504,
            _ => 500,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Network(_) => "NETWORK_ERROR",
            Self::Protocol(_) => "PROTOCOL_ERROR",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Unavailable(_) => "UNAVAILABLE",
            Self::Timeout(_) => "TIMEOUT",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        GatewayError::Network(err.to_string())
    }
}

impl From<SgipError> for GatewayError {
    fn from(err: SgipError) -> Self {
        match err {
            SgipError::Config(msg) => GatewayError::Config(msg),
            SgipError::Io(e) => GatewayError::Network(e.to_string()),
            SgipError::Timeout => GatewayError::Timeout("peer did not answer in time".to_string()),
            other => GatewayError::Protocol(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(GatewayError::Validation("x".into()).status_code(), 400);
        assert_eq!(GatewayError::Forbidden("x".into()).status_code(), 403);
        assert_eq!(GatewayError::Network("x".into()).status_code(), 500);
    }

    #[test]
    fn test_sgip_error_mapping() {
        let err: GatewayError = SgipError::Config("bad port".into()).into();
        assert!(matches!(err, GatewayError::Config(_)));
        assert_eq!(err.error_code(), "CONFIG_ERROR");

        let err: GatewayError = SgipError::Timeout.into();
        assert!(matches!(err, GatewayError::Timeout(_)));
    }
}
