use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Operational state of a proxy backend.
///
/// The tunnel backend walks every variant; the native backend only ever
/// reports `Stopped` and `Started`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyState {
    #[default]
    Stopped,
    Starting,
    Started,
    Reasserting,
    Stopping,
}

impl ProxyState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Started => "started",
            Self::Reasserting => "reasserting",
            Self::Stopping => "stopping",
        }
    }

    /// States in which a freshly launched pipeline may begin consuming reads.
    pub fn expects_traffic(&self) -> bool {
        matches!(self, Self::Starting | Self::Reasserting)
    }
}

impl fmt::Display for ProxyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProxyState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stopped" | "" => Ok(Self::Stopped),
            "starting" => Ok(Self::Starting),
            "started" => Ok(Self::Started),
            "reasserting" => Ok(Self::Reasserting),
            "stopping" => Ok(Self::Stopping),
            other => Err(format!("unknown proxy state '{}'", other)),
        }
    }
}
