mod buffer_pool;
mod upstream_exchange;

pub use buffer_pool::{BufferPool, PacketBuffer};
pub use upstream_exchange::{read_dns_response, UpstreamExchange, DNS_MESSAGE_CONTENT_TYPE};
