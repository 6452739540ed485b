//! SGIP gateway configuration

use serde::{Deserialize, Serialize};
use std::env;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::errors::SgipError;

/// Complete gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SgipConfig {
    /// Remote SMG, used by both roles
    pub peer: PeerConfig,
    /// Inbound listener
    pub server: ServerConfig,
    /// Outbound worker pool
    pub client: ClientConfig,
    /// HTTP submission endpoint
    pub http: HttpConfig,
    /// Operator identity and credentials
    pub identity: IdentityConfig,
    /// Notification callbacks
    pub callbacks: CallbackConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerConfig {
    /// Peer IP; inbound connections from any other address are dropped
    pub ip: String,
    pub port: u16,
    /// Read deadline in whole seconds
    pub read_timeout_secs: u64,
    /// Write deadline in whole seconds
    pub write_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Number of outbound workers, each owning at most one session
    pub worker_count: usize,
    /// Bounded submission queue depth
    pub queue_depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub listen_port: u16,
    /// Only this address may submit messages
    pub allowed_ip: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub area_phone_no: u32,
    pub corp_id: u32,
    pub login_name: String,
    pub login_password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CallbackConfig {
    pub deliver_url: String,
    pub report_url: String,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            ip: "127.0.0.1".to_string(),
            port: crate::DEFAULT_SGIP_PORT,
            read_timeout_secs: 30,
            write_timeout_secs: 30,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_port: crate::DEFAULT_SGIP_PORT,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            queue_depth: 100,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen_port: 8080,
            allowed_ip: "127.0.0.1".to_string(),
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            area_phone_no: 10,
            corp_id: 0,
            login_name: String::new(),
            login_password: String::new(),
        }
    }
}

impl SgipConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: &str) -> Result<Self, SgipError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| SgipError::Config(format!("{}: {}", path, e)))?;

        let config: Self =
            serde_json::from_str(&content).map_err(|e| SgipError::Config(e.to_string()))?;
        config.validate()?;
        info!(path = %path, peer = %config.peer_address(), "SGIP configuration loaded from file");
        Ok(config)
    }

    /// Build configuration from `SGIP_*` environment variables over the defaults
    pub fn from_env() -> Result<Self, SgipError> {
        let defaults = Self::default();
        let config = Self {
            peer: PeerConfig {
                ip: env::var("SGIP_PEER_IP").unwrap_or(defaults.peer.ip),
                port: env_parse("SGIP_PEER_PORT", defaults.peer.port)?,
                read_timeout_secs: env_parse("SGIP_READ_TIMEOUT_SECS", defaults.peer.read_timeout_secs)?,
                write_timeout_secs: env_parse("SGIP_WRITE_TIMEOUT_SECS", defaults.peer.write_timeout_secs)?,
            },
            server: ServerConfig {
                listen_port: env_parse("SGIP_LISTEN_PORT", defaults.server.listen_port)?,
            },
            client: ClientConfig {
                worker_count: env_parse("SGIP_WORKER_COUNT", defaults.client.worker_count)?,
                queue_depth: env_parse("SGIP_QUEUE_DEPTH", defaults.client.queue_depth)?,
            },
            http: HttpConfig {
                listen_port: env_parse("SGIP_HTTP_PORT", defaults.http.listen_port)?,
                allowed_ip: env::var("SGIP_HTTP_ALLOWED_IP").unwrap_or(defaults.http.allowed_ip),
            },
            identity: IdentityConfig {
                area_phone_no: env_parse("SGIP_AREA_PHONE_NO", defaults.identity.area_phone_no)?,
                corp_id: env_parse("SGIP_CORP_ID", defaults.identity.corp_id)?,
                login_name: env::var("SGIP_LOGIN_NAME").unwrap_or(defaults.identity.login_name),
                login_password: env::var("SGIP_LOGIN_PASSWORD")
                    .unwrap_or(defaults.identity.login_password),
            },
            callbacks: CallbackConfig {
                deliver_url: env::var("SGIP_DELIVER_CALLBACK_URL")
                    .unwrap_or(defaults.callbacks.deliver_url),
                report_url: env::var("SGIP_REPORT_CALLBACK_URL")
                    .unwrap_or(defaults.callbacks.report_url),
            },
        };
        config.validate()?;
        debug!(peer = %config.peer_address(), workers = config.client.worker_count, "SGIP configuration loaded from environment");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SgipError> {
        if self.client.worker_count == 0 {
            return Err(SgipError::Config("worker_count must be at least 1".to_string()));
        }
        if self.client.queue_depth == 0 {
            return Err(SgipError::Config("queue_depth must be at least 1".to_string()));
        }
        self.peer_ip()?;
        Ok(())
    }

    pub fn peer_ip(&self) -> Result<IpAddr, SgipError> {
        self.peer
            .ip
            .parse()
            .map_err(|e| SgipError::Config(format!("Invalid peer ip {}: {}", self.peer.ip, e)))
    }

    /// `host:port` of the remote SMG for outbound sessions
    pub fn peer_address(&self) -> String {
        format!("{}:{}", self.peer.ip, self.peer.port)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.peer.read_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.peer.write_timeout_secs)
    }
}

fn env_parse<T>(key: &str, default: T) -> Result<T, SgipError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| SgipError::Config(format!("Invalid {}: {}", key, e))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SgipConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.peer_address(), "127.0.0.1:8801");
        assert_eq!(config.read_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SgipConfig = serde_json::from_str(
            r#"{"peer": {"ip": "10.0.0.7"}, "identity": {"corp_id": 12345, "login_name": "sp"}}"#,
        )
        .unwrap();
        assert_eq!(config.peer.ip, "10.0.0.7");
        assert_eq!(config.peer.port, 8801);
        assert_eq!(config.identity.corp_id, 12345);
        assert_eq!(config.identity.area_phone_no, 10);
        assert_eq!(config.client.worker_count, 4);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = SgipConfig::default();
        config.client.worker_count = 0;
        assert!(matches!(config.validate(), Err(SgipError::Config(_))));

        let mut config = SgipConfig::default();
        config.peer.ip = "smg.example".to_string();
        assert!(config.validate().is_err());
    }
}
