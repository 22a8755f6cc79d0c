use ferrous_doh_domain::ProxyState;

/// Sink for everything the engine reports to the outside world.
///
/// Every method defaults to a no-op, so a consumer only implements what it
/// relays. Methods are called from engine tasks and must not block.
pub trait ProxyEvents: Send + Sync {
    fn on_state_change(&self, _state: ProxyState) {}

    fn on_query(&self, _msg_id: u16, _qname: &str) {}

    fn on_info(&self, _message: &str) {}

    fn on_error(&self, _message: &str) {}
}

pub struct NoopEvents;

impl ProxyEvents for NoopEvents {}
