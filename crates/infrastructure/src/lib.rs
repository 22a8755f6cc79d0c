//! Ferrous DoH Infrastructure Layer
//!
//! Adapters behind the application ports: the failover DoH transport, the
//! leak-guard helper supervisor, the Linux TUN device, the native OS DoH
//! backend, host identity probes and the tracing event sink.

pub mod doh;
pub mod events;
pub mod system;
