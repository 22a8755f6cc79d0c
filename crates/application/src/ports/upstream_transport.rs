use async_trait::async_trait;
use bytes::Bytes;
use ferrous_doh_domain::DomainError;
use std::sync::Arc;

use super::ProxyEvents;

#[derive(Debug, Clone)]
pub struct DohRequest {
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: Bytes,
}

pub struct DohResponse {
    pub status: u16,
    pub body: Box<dyn ResponseStream>,
}

/// Body of an upstream response, consumed chunk by chunk.
#[async_trait]
pub trait ResponseStream: Send {
    /// `Ok(None)` at end of stream.
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, DomainError>;
}

/// Where DoH requests are sent. Failover between endpoints, if any, happens
/// behind this trait.
#[async_trait]
pub trait UpstreamTransport: Send + Sync {
    async fn round_trip(&self, request: DohRequest) -> Result<DohResponse, DomainError>;

    /// Picks the preferred endpoint ahead of the first query.
    /// Default implementation does nothing.
    async fn warm_up(&self) -> Result<(), DomainError> {
        Ok(())
    }
}

/// Builds the transport used by one proxy run. Called on every successful
/// start; the previous transport is dropped, never reused.
pub trait TransportFactory: Send + Sync {
    fn build(&self, events: Arc<dyn ProxyEvents>) -> Result<Arc<dyn UpstreamTransport>, DomainError>;
}
