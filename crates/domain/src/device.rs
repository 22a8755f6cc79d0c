use serde::{Deserialize, Serialize};

pub const HEADER_DEVICE_NAME: &str = "X-Device-Name";
pub const HEADER_DEVICE_MODEL: &str = "X-Device-Model";
pub const HEADER_DEVICE_ID: &str = "X-Device-Id";
pub const HEADER_USER_AGENT: &str = "User-Agent";

const USER_AGENT_PRODUCT: &str = "ferrous-doh";

/// Identity of the host reported to the upstream resolver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub name: String,
    pub model: String,
    pub id: String,
    pub version: String,
}

impl DeviceIdentity {
    pub fn new(
        name: impl Into<String>,
        model: impl Into<String>,
        id: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            id: id.into(),
            version: version.into(),
        }
    }

    /// Identity carrying only the software version, used when device
    /// reporting is turned off.
    pub fn anonymous(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..Self::default()
        }
    }

    pub fn user_agent(&self) -> String {
        let version = if self.version.is_empty() {
            "dev"
        } else {
            &self.version
        };
        format!("{}/{}", USER_AGENT_PRODUCT, version)
    }

    /// Extra request headers: device fields only when known, user agent always.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = Vec::with_capacity(4);
        if !self.name.is_empty() {
            headers.push((HEADER_DEVICE_NAME, self.name.clone()));
        }
        if !self.model.is_empty() {
            headers.push((HEADER_DEVICE_MODEL, self.model.clone()));
        }
        if !self.id.is_empty() {
            headers.push((HEADER_DEVICE_ID, self.id.clone()));
        }
        headers.push((HEADER_USER_AGENT, self.user_agent()));
        headers
    }
}
