use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Which proxy implementation the binary drives.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Native OS DoH when the probe finds it, the tunnel otherwise.
    #[default]
    Auto,
    Tunnel,
    Native,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Tunnel => "tunnel",
            Self::Native => "native",
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "tunnel" | "tun" => Ok(Self::Tunnel),
            "native" => Ok(Self::Native),
            other => Err(format!("unknown backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProxyConfig {
    #[serde(default)]
    pub backend: BackendKind,

    /// Delay between interface reopen attempts after an unexpected failure.
    #[serde(default = "default_retry_interval")]
    pub retry_interval_secs: u64,

    /// Bound on the background endpoint selection run after each start.
    #[serde(default = "default_warm_up_timeout")]
    pub warm_up_timeout_secs: u64,
}

impl ProxyConfig {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }

    pub fn warm_up_timeout(&self) -> Duration {
        Duration::from_secs(self.warm_up_timeout_secs)
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            retry_interval_secs: default_retry_interval(),
            warm_up_timeout_secs: default_warm_up_timeout(),
        }
    }
}

fn default_retry_interval() -> u64 {
    5
}

fn default_warm_up_timeout() -> u64 {
    60
}
