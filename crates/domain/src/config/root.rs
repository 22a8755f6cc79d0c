use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use super::errors::ConfigError;
use super::leak_guard::LeakGuardConfig;
use super::logging::LoggingConfig;
use super::proxy::{BackendKind, ProxyConfig};
use super::tunnel::TunnelConfig;
use super::upstream::UpstreamConfig;
use crate::endpoint::Endpoint;

const LOCAL_CONFIG_PATH: &str = "ferrous-doh.toml";
const SYSTEM_CONFIG_PATH: &str = "/etc/ferrous-doh/config.toml";

/// Smallest MTU able to carry the IPv4/UDP headers plus a DNS header.
const MIN_MTU: u16 = 576;

/// Main configuration structure for Ferrous DoH
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Virtual interface addressing
    #[serde(default)]
    pub tunnel: TunnelConfig,

    /// Upstream resolver and endpoint steering
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Backend selection and recovery timing
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// DNS leak prevention helper
    #[serde(default)]
    pub leak_guard: LeakGuardConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file or use defaults
    ///
    /// Priority order:
    /// 1. Explicitly provided path
    /// 2. ferrous-doh.toml in current directory
    /// 3. /etc/ferrous-doh/config.toml
    /// 4. Default configuration
    pub fn load(path: Option<&str>, cli_overrides: CliOverrides) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = path {
            Self::from_file(path)?
        } else if std::path::Path::new(LOCAL_CONFIG_PATH).exists() {
            Self::from_file(LOCAL_CONFIG_PATH)?
        } else if std::path::Path::new(SYSTEM_CONFIG_PATH).exists() {
            Self::from_file(SYSTEM_CONFIG_PATH)?
        } else {
            Self::default()
        };

        config.apply_cli_overrides(cli_overrides);
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_string(), e.to_string()))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    fn apply_cli_overrides(&mut self, overrides: CliOverrides) {
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
        if let Some(configuration) = overrides.configuration {
            self.upstream.configuration = configuration;
        }
        if overrides.no_report_device {
            self.upstream.report_device_name = false;
        }
        if let Some(backend) = overrides.backend {
            self.proxy.backend = backend;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tunnel.mtu < MIN_MTU {
            return Err(ConfigError::Validation(format!(
                "Tunnel MTU {} is below the minimum of {}",
                self.tunnel.mtu, MIN_MTU
            )));
        }

        if self.tunnel.address == self.tunnel.gateway {
            return Err(ConfigError::Validation(
                "Tunnel address and gateway must differ".to_string(),
            ));
        }

        if self.proxy.retry_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "Retry interval cannot be 0".to_string(),
            ));
        }

        if !self.upstream.base_url.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "Upstream base URL '{}' must use https",
                self.upstream.base_url
            )));
        }

        for ip in &self.upstream.router_bootstrap_ips {
            ip.parse::<IpAddr>().map_err(|_| {
                ConfigError::Validation(format!("Invalid router bootstrap IP '{}'", ip))
            })?;
        }

        for spec in self
            .upstream
            .anycast_endpoints
            .iter()
            .chain(&self.upstream.fallback_endpoints)
        {
            spec.parse::<Endpoint>().map_err(ConfigError::Validation)?;
        }

        Ok(())
    }

    pub fn save(&self, path: &str) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Parse(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, toml_string)
            .map_err(|e| ConfigError::FileWrite(path.to_string(), e.to_string()))?;
        Ok(())
    }
}

/// Command-line overrides for configuration
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub log_level: Option<String>,
    pub configuration: Option<String>,
    pub no_report_device: bool,
    pub backend: Option<BackendKind>,
}
