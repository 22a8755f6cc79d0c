use ferrous_doh_domain::{DomainError, TunnelConfig};
use std::sync::Arc;

/// An opened virtual interface carrying raw IP datagrams.
///
/// `read` and `write` block the calling thread. `read` returning `Ok(0)`
/// means end of stream. `close` must be idempotent and must unblock a reader
/// parked in `read`.
pub trait VirtualInterface: Send + Sync {
    fn read(&self, buf: &mut [u8]) -> Result<usize, DomainError>;

    fn write(&self, datagram: &[u8]) -> Result<usize, DomainError>;

    fn close(&self) -> Result<(), DomainError>;
}

/// Creates and configures the OS-level device. Blocking.
pub trait InterfaceOpener: Send + Sync {
    fn open(&self, config: &TunnelConfig) -> Result<Arc<dyn VirtualInterface>, DomainError>;
}
