use async_trait::async_trait;
use ferrous_doh_domain::DomainError;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::ProxyEvents;

/// Keeps DNS traffic from bypassing the tunnel while a run is active.
#[async_trait]
pub trait LeakGuard: Send + Sync {
    /// Starts protection for as long as `lifetime` is not cancelled.
    /// Returns once protection is in place; teardown happens in the
    /// background when `lifetime` fires.
    async fn start(
        &self,
        lifetime: CancellationToken,
        events: Arc<dyn ProxyEvents>,
    ) -> Result<(), DomainError>;
}

/// Leak guard for hosts where the helper is turned off.
pub struct DisabledLeakGuard;

#[async_trait]
impl LeakGuard for DisabledLeakGuard {
    async fn start(
        &self,
        _lifetime: CancellationToken,
        _events: Arc<dyn ProxyEvents>,
    ) -> Result<(), DomainError> {
        Ok(())
    }
}
