use ferrous_doh_application::ports::{ProxyEvents, TransportFactory, UpstreamTransport};
use ferrous_doh_domain::{DomainError, UpstreamConfig};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use super::endpoint_manager::EndpointManager;
use super::providers::{EndpointProvider, SourceUrlProvider, StaticProvider};

/// Builds the endpoint manager used by each proxy run.
///
/// Provider order: the routing service (unicast), then the anycast
/// endpoints, then the CDN-fronted fallback.
pub struct EndpointTransportFactory {
    config: UpstreamConfig,
}

impl EndpointTransportFactory {
    pub fn new(config: UpstreamConfig) -> Self {
        Self { config }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.request_timeout_secs)
    }

    pub fn providers(&self) -> Result<Vec<Arc<dyn EndpointProvider>>, DomainError> {
        let bootstrap_ips = self
            .config
            .router_bootstrap_ips
            .iter()
            .map(|ip| {
                ip.parse::<IpAddr>().map_err(|_| {
                    DomainError::InvalidEndpoint(format!("Invalid router bootstrap IP '{}'", ip))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut providers: Vec<Arc<dyn EndpointProvider>> = Vec::with_capacity(3);
        providers.push(Arc::new(SourceUrlProvider::new(
            &self.config.router_url,
            &bootstrap_ips,
            self.timeout(),
        )?));
        if !self.config.anycast_endpoints.is_empty() {
            providers.push(Arc::new(StaticProvider::from_specs(
                "anycast",
                &self.config.anycast_endpoints,
            )?));
        }
        if !self.config.fallback_endpoints.is_empty() {
            providers.push(Arc::new(StaticProvider::from_specs(
                "fallback",
                &self.config.fallback_endpoints,
            )?));
        }
        Ok(providers)
    }
}

impl TransportFactory for EndpointTransportFactory {
    fn build(
        &self,
        events: Arc<dyn ProxyEvents>,
    ) -> Result<Arc<dyn UpstreamTransport>, DomainError> {
        let manager = EndpointManager::new(self.providers()?, events).with_timeout(self.timeout());
        Ok(Arc::new(manager))
    }
}
