//! Configuration types for the status proxy

use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_UPSTREAM_URL: &str = "https://status.zama.ai/index.json";
pub const DEFAULT_USER_AGENT: &str = "Zama-Status-Proxy/1.0";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            upstream: UpstreamConfig::default(),
            cache: CacheConfig::default(),
            server: ServerConfig::default(),
            service_name: default_service_name(),
        }
    }
}

/// Where the status document comes from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_upstream_url")]
    pub url: String,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: default_upstream_url(),
            timeout_seconds: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Config {
    /// Reject settings the proxy cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        let url = self.upstream.url.trim();
        if url.is_empty() {
            return Err(crate::ProxyError::Config(
                "upstream.url must not be empty".to_string(),
            ));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(crate::ProxyError::Config(format!(
                "upstream.url must be an http(s) URL, got {:?}",
                url
            )));
        }
        if self.upstream.timeout_seconds == 0 {
            return Err(crate::ProxyError::Config(
                "upstream.timeout_seconds must be positive".to_string(),
            ));
        }
        if self.cache.ttl_seconds == 0 {
            return Err(crate::ProxyError::Config(
                "cache.ttl_seconds must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_upstream_url() -> String {
    DEFAULT_UPSTREAM_URL.to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_ttl() -> u64 {
    30
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_service_name() -> String {
    "zama-status-proxy".to_string()
}

/// Load configuration from a JSON file
pub fn load_config(path: &Path) -> crate::Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::ProxyError::Config(format!("Failed to read config file {:?}: {}", path, e))
    })?;
    let config: Config = serde_json::from_str(&content)?;
    Ok(config)
}
