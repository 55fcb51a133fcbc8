// src/api/session.rs
use crate::{config::Config, error::EnrichError};
use log::info;
use reqwest::Client;
use std::time::Duration;

/// Builds the process-wide HTTP client. Clones share one connection pool.
pub fn build_http_client(total_timeout: Duration) -> Result<Client, EnrichError> {
    let client = Client::builder()
        .use_rustls_tls()
        .min_tls_version(reqwest::tls::Version::TLS_1_2)
        .timeout(total_timeout)
        .pool_idle_timeout(Duration::from_secs(90))
        .user_agent(concat!("vrm-enrich/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| EnrichError::Transport(format!("Failed to build HTTP client: {}", e)))?;
    info!("HTTP client ready (TLS >= 1.2, timeout {:?})", total_timeout);
    Ok(client)
}

pub fn http_client_from_config(config: &Config) -> Result<Client, EnrichError> {
    build_http_client(config.http_timeout())
}
