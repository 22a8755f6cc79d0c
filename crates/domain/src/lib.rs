//! Ferrous DoH Domain Layer
pub mod config;
pub mod dedup;
pub mod device;
pub mod endpoint;
pub mod errors;
pub mod packet;
pub mod proxy_state;

pub use config::{
    BackendKind, CliOverrides, Config, ConfigError, LeakGuardConfig, LoggingConfig, ProxyConfig,
    TunnelConfig, UpstreamConfig,
};
pub use dedup::{DuplicateFilter, DEDUP_WINDOW};
pub use device::DeviceIdentity;
pub use endpoint::Endpoint;
pub use errors::DomainError;
pub use packet::PacketVerdict;
pub use proxy_state::ProxyState;
