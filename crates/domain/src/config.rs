pub mod errors;
pub mod leak_guard;
pub mod logging;
pub mod proxy;
pub mod root;
pub mod tunnel;
pub mod upstream;

pub use errors::ConfigError;
pub use leak_guard::LeakGuardConfig;
pub use logging::LoggingConfig;
pub use proxy::{BackendKind, ProxyConfig};
pub use root::{CliOverrides, Config};
pub use tunnel::TunnelConfig;
pub use upstream::UpstreamConfig;
