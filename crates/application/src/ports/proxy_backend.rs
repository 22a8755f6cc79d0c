use async_trait::async_trait;
use ferrous_doh_domain::{DeviceIdentity, DomainError, ProxyState};
use std::time::Duration;
use tokio::time::Instant;

const SETTLE_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Capability set shared by the tunnel proxy and the native OS DoH backend.
/// The binary picks one implementation at startup.
#[async_trait]
pub trait ProxyBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn set_config_id(&self, config_id: &str);

    fn set_device_info(&self, identity: DeviceIdentity);

    async fn state(&self) -> ProxyState;

    /// No-op success when already running.
    async fn start(&self) -> Result<(), DomainError>;

    /// No-op success when already stopped.
    ///
    /// May return while the backend is still `Stopping`; teardown finishes
    /// in the background. Use `wait_stopped` to wait for it.
    async fn stop(&self) -> Result<(), DomainError>;

    /// Waits until the backend reports `Stopped`. Returns false if `limit`
    /// elapses first.
    async fn wait_stopped(&self, limit: Duration) -> bool {
        let deadline = Instant::now() + limit;
        loop {
            if self.state().await == ProxyState::Stopped {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(SETTLE_POLL_INTERVAL).await;
        }
    }
}
