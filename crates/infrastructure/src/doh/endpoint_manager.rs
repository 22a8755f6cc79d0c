use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use ferrous_doh_application::ports::{DohRequest, DohResponse, ProxyEvents, UpstreamTransport};
use ferrous_doh_domain::{DomainError, Endpoint};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::providers::EndpointProvider;
use super::sender::{EndpointSender, ReqwestSender};

/// Failover DoH transport.
///
/// Each request goes to the current endpoint, with the request URL's host
/// replaced by the endpoint's. A transport-level failure is reported and the
/// providers are walked in order; the first endpoint that completes the
/// request becomes current. HTTP status codes are not failures here.
pub struct EndpointManager {
    providers: Vec<Arc<dyn EndpointProvider>>,
    sender: Arc<dyn EndpointSender>,
    current: ArcSwapOption<Endpoint>,
    events: Arc<dyn ProxyEvents>,
}

impl EndpointManager {
    pub fn new(providers: Vec<Arc<dyn EndpointProvider>>, events: Arc<dyn ProxyEvents>) -> Self {
        Self {
            providers,
            sender: Arc::new(ReqwestSender::default()),
            current: ArcSwapOption::empty(),
            events,
        }
    }

    /// Replaces the sender with an HTTPS one using `timeout` per request.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_sender(Arc::new(ReqwestSender::new(timeout)))
    }

    pub fn with_sender(mut self, sender: Arc<dyn EndpointSender>) -> Self {
        self.sender = sender;
        self
    }

    pub fn current(&self) -> Option<Arc<Endpoint>> {
        self.current.load_full()
    }

    fn report_failure(&self, endpoint: &Endpoint, error: &DomainError) {
        self.events
            .on_error(&format!("Endpoint failed: {}: {}", endpoint.hostname, error));
    }

    fn switch_to(&self, endpoint: &Endpoint) {
        let previous = self.current.swap(Some(Arc::new(endpoint.clone())));
        if previous.as_deref() != Some(endpoint) {
            self.events
                .on_info(&format!("Switching endpoint: {}", endpoint.hostname));
        }
    }

    async fn candidates(&self, provider: &Arc<dyn EndpointProvider>) -> Vec<Endpoint> {
        match provider.endpoints().await {
            Ok(endpoints) => endpoints,
            Err(e) => {
                self.events.on_error(&format!(
                    "Endpoint provider {} failed: {}",
                    provider.name(),
                    e
                ));
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl UpstreamTransport for EndpointManager {
    async fn round_trip(&self, request: DohRequest) -> Result<DohResponse, DomainError> {
        let failed = match self.current.load_full() {
            Some(current) => match self.sender.send(&current, &request).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    self.report_failure(&current, &e);
                    Some(current)
                }
            },
            None => None,
        };

        for provider in &self.providers {
            for endpoint in self.candidates(provider).await {
                if failed.as_deref() == Some(&endpoint) {
                    continue;
                }
                match self.sender.send(&endpoint, &request).await {
                    Ok(response) => {
                        self.switch_to(&endpoint);
                        return Ok(response);
                    }
                    Err(e) => self.report_failure(&endpoint, &e),
                }
            }
        }

        Err(DomainError::NoUsableEndpoint)
    }

    async fn warm_up(&self) -> Result<(), DomainError> {
        for provider in &self.providers {
            for endpoint in self.candidates(provider).await {
                match self.sender.check(&endpoint).await {
                    Ok(()) => {
                        debug!(endpoint = %endpoint, "Endpoint reachable");
                        self.switch_to(&endpoint);
                        return Ok(());
                    }
                    Err(e) => self.report_failure(&endpoint, &e),
                }
            }
        }
        Err(DomainError::NoUsableEndpoint)
    }
}
