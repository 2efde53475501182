// Handles client configuration loading, saving, and defaults.
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;
use url::Url;

fn default_development_hosts() -> Vec<String> {
    vec!["localhost".to_string(), "127.0.0.1".to_string()]
}

fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_development_hosts")]
    pub development_hosts: Vec<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            // Match the serde defaults
            development_hosts: default_development_hosts(),
            request_timeout_secs: 30,
        }
    }
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Load the configuration from a TOML file.
    /// Returns a contextualized error if reading or parsing fails.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Save the configuration as TOML.
    pub fn save(&self, path: &Path) -> Result<()> {
        let toml_str = toml::to_string_pretty(self)?;
        fs::write(path, toml_str)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }

    /// True when requests to `url` should bypass certificate verification:
    /// either a development network location by shape, or a host the
    /// configuration explicitly trusts.
    pub fn is_development_url(&self, url: &str) -> bool {
        if is_development_url(url) {
            return true;
        }
        if let Ok(parsed) = Url::parse(url)
            && let Some(host) = parsed.host_str()
        {
            return self.development_hosts.iter().any(|h| h == host);
        }
        false
    }

    /// Join a base URL and a path with exactly one `/` between them.
    pub fn join(base: &str, path: &str) -> String {
        format!(
            "{}/{}",
            base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Development-by-shape check: plain HTTP, loopback, `localhost`, mDNS
/// `.local` names, and RFC 1918 private IPv4 ranges.
/// An unparsable URL is never a development URL.
pub fn is_development_url(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };

    if parsed.scheme() == "http" {
        return true;
    }
    if host == "localhost" || host.ends_with(".local") {
        return true;
    }
    if let Ok(ip) = host.parse::<Ipv4Addr>() {
        // Covers 127/8, 10/8, 172.16/12 and 192.168/16.
        return ip.is_loopback() || ip.is_private();
    }
    false
}
