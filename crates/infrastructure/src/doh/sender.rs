use async_trait::async_trait;
use dashmap::DashMap;
use ferrous_doh_application::ports::{DohRequest, DohResponse};
use ferrous_doh_domain::{DomainError, Endpoint};
use std::time::Duration;

use super::body_stream::ReqwestBodyStream;
use super::client::{build_endpoint_client, map_send_error};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Talks to one endpoint at a time on behalf of the endpoint manager.
#[async_trait]
pub trait EndpointSender: Send + Sync {
    /// POSTs `request` to `endpoint`. Only transport failures are errors.
    async fn send(&self, endpoint: &Endpoint, request: &DohRequest)
        -> Result<DohResponse, DomainError>;

    /// Reachability check: any HTTP answer counts.
    async fn check(&self, endpoint: &Endpoint) -> Result<(), DomainError>;
}

/// HTTPS sender keeping one pooled client per endpoint.
pub struct ReqwestSender {
    clients: DashMap<Endpoint, reqwest::Client>,
    timeout: Duration,
}

impl ReqwestSender {
    pub fn new(timeout: Duration) -> Self {
        Self {
            clients: DashMap::new(),
            timeout,
        }
    }

    fn client_for(&self, endpoint: &Endpoint) -> Result<reqwest::Client, DomainError> {
        if let Some(client) = self.clients.get(endpoint) {
            return Ok(client.clone());
        }
        let client = build_endpoint_client(endpoint, self.timeout)?;
        self.clients.insert(endpoint.clone(), client.clone());
        Ok(client)
    }
}

impl Default for ReqwestSender {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

#[async_trait]
impl EndpointSender for ReqwestSender {
    async fn send(
        &self,
        endpoint: &Endpoint,
        request: &DohRequest,
    ) -> Result<DohResponse, DomainError> {
        let url = rewrite_host(&request.url, endpoint)?;
        let client = self.client_for(endpoint)?;

        let mut builder = client.post(url).body(request.body.clone());
        for (name, value) in &request.headers {
            builder = builder.header(*name, value.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| map_send_error(endpoint, e))?;

        Ok(DohResponse {
            status: response.status().as_u16(),
            body: Box::new(ReqwestBodyStream::new(response)),
        })
    }

    async fn check(&self, endpoint: &Endpoint) -> Result<(), DomainError> {
        let client = self.client_for(endpoint)?;
        client
            .get(endpoint.url())
            .send()
            .await
            .map(|_| ())
            .map_err(|e| map_send_error(endpoint, e))
    }
}

/// Points `url` at `endpoint`, keeping scheme, path and query.
pub(crate) fn rewrite_host(url: &str, endpoint: &Endpoint) -> Result<reqwest::Url, DomainError> {
    let mut url = reqwest::Url::parse(url)
        .map_err(|e| DomainError::InvalidEndpoint(format!("{}: {}", url, e)))?;
    url.set_host(Some(&*endpoint.hostname))
        .map_err(|e| DomainError::InvalidEndpoint(format!("{}: {}", endpoint.hostname, e)))?;
    let port = (endpoint.port != 443).then_some(endpoint.port);
    url.set_port(port)
        .map_err(|_| DomainError::InvalidEndpoint(format!("{}: cannot set port", endpoint)))?;
    Ok(url)
}
