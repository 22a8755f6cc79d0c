use ferrous_doh_application::ports::ProxyEvents;
use ferrous_doh_domain::ProxyState;
use tracing::{debug, error, info};

/// Forwards engine events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEvents;

impl ProxyEvents for TracingEvents {
    fn on_state_change(&self, state: ProxyState) {
        info!(state = %state, "Proxy state changed");
    }

    fn on_query(&self, msg_id: u16, qname: &str) {
        debug!(msg_id = %format_args!("{:04x}", msg_id), qname, "Query");
    }

    fn on_info(&self, message: &str) {
        info!("{}", message);
    }

    fn on_error(&self, message: &str) {
        error!("{}", message);
    }
}
