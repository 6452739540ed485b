//! SGIP Gateway binary

use gateway_core::{Result, ServiceConfig, ServiceRuntime};
use sgip_gateway::SgipGatewayService;
use sgip_proto::SgipConfig;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let service_config = ServiceConfig::from_env();
    init_tracing(&service_config);

    info!("Starting SGIP gateway");

    let config = load_config()?;
    let service = Arc::new(SgipGatewayService::new(config)?);
    ServiceRuntime::new(service_config).run(service).await
}

fn init_tracing(config: &ServiceConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level))
        .add_directive("sgip_gateway=debug".parse().expect("static directive"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// JSON file named by `SGIP_CONFIG`, otherwise `SGIP_*` variables
fn load_config() -> Result<SgipConfig> {
    let config = match std::env::var("SGIP_CONFIG") {
        Ok(path) => {
            info!(path = %path, "Loading configuration file");
            SgipConfig::from_file(&path)?
        }
        Err(_) => SgipConfig::from_env()?,
    };
    Ok(config)
}
