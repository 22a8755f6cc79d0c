use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Failed to open virtual interface: {0}")]
    InterfaceOpen(String),

    #[error("Virtual interface I/O error: {0}")]
    InterfaceIo(String),

    #[error("Upstream transport error: {0}")]
    UpstreamTransport(String),

    #[error("Upstream returned HTTP {0}")]
    UpstreamStatus(u16),

    #[error("Upstream response read failed: {0}")]
    UpstreamRead(String),

    #[error("Upstream timeout contacting {server}")]
    UpstreamTimeout { server: String },

    #[error("No usable upstream endpoint available")]
    NoUsableEndpoint,

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Endpoint provider failed: {0}")]
    ProviderFailed(String),

    #[error("Leak guard helper failed to start: {0}")]
    HelperSpawn(String),

    #[error("Native DoH command failed: {0}")]
    NativeDoh(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl DomainError {
    /// Errors raised before any byte reached the upstream resolver.
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Self::UpstreamTransport(_) | Self::UpstreamTimeout { .. } | Self::NoUsableEndpoint
        )
    }
}
