mod leak_guard;
mod proxy_backend;
mod proxy_events;
mod upstream_transport;
mod virtual_interface;

pub use leak_guard::{DisabledLeakGuard, LeakGuard};
pub use proxy_backend::ProxyBackend;
pub use proxy_events::{NoopEvents, ProxyEvents};
pub use upstream_transport::{
    DohRequest, DohResponse, ResponseStream, TransportFactory, UpstreamTransport,
};
pub use virtual_interface::{InterfaceOpener, VirtualInterface};
