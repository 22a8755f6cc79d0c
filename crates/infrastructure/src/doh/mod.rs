//! DNS-over-HTTPS transport with endpoint failover.
//!
//! Requests are sent to whichever endpoint is current. When it fails at the
//! transport level, providers are walked in order and the first endpoint
//! that answers becomes current.

pub mod body_stream;
pub mod client;
pub mod endpoint_manager;
pub mod providers;
pub mod sender;
pub mod transport_factory;

pub use body_stream::ReqwestBodyStream;
pub use client::build_endpoint_client;
pub use endpoint_manager::EndpointManager;
pub use providers::{parse_endpoint_list, EndpointProvider, SourceUrlProvider, StaticProvider};
pub use sender::{EndpointSender, ReqwestSender};
pub use transport_factory::EndpointTransportFactory;
