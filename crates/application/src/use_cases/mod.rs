pub mod packet_pipeline;
pub mod tunnel_proxy;

pub use packet_pipeline::PacketPipeline;
pub use tunnel_proxy::{ProxyPorts, TunnelProxy, TunnelProxyOptions};
