use async_trait::async_trait;
use ferrous_doh_domain::{DomainError, Endpoint};
use std::net::IpAddr;
use std::time::Duration;
use tracing::{debug, warn};

use super::client::{build_endpoint_client, map_send_error};

/// Source of candidate endpoints, asked in order of preference.
#[async_trait]
pub trait EndpointProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn endpoints(&self) -> Result<Vec<Endpoint>, DomainError>;
}

/// Fixed endpoint list.
pub struct StaticProvider {
    name: String,
    endpoints: Vec<Endpoint>,
}

impl StaticProvider {
    pub fn new(name: impl Into<String>, endpoints: Vec<Endpoint>) -> Self {
        Self {
            name: name.into(),
            endpoints,
        }
    }

    /// Parses endpoint spec strings, failing on the first invalid one.
    pub fn from_specs(name: impl Into<String>, specs: &[String]) -> Result<Self, DomainError> {
        let endpoints = specs
            .iter()
            .map(|spec| spec.parse::<Endpoint>().map_err(DomainError::InvalidEndpoint))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(name, endpoints))
    }
}

#[async_trait]
impl EndpointProvider for StaticProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn endpoints(&self) -> Result<Vec<Endpoint>, DomainError> {
        Ok(self.endpoints.clone())
    }
}

/// Asks a routing service for the endpoints nearest to this host.
///
/// The service itself is reached through one bootstrap address picked at
/// random, so contacting it does not depend on working DNS.
pub struct SourceUrlProvider {
    source_url: String,
    router: Endpoint,
    client: reqwest::Client,
}

impl SourceUrlProvider {
    pub fn new(
        source_url: &str,
        bootstrap_ips: &[IpAddr],
        timeout: Duration,
    ) -> Result<Self, DomainError> {
        let mut router: Endpoint = source_url.parse().map_err(DomainError::InvalidEndpoint)?;
        if !bootstrap_ips.is_empty() {
            let ip = bootstrap_ips[fastrand::usize(..bootstrap_ips.len())];
            router.bootstrap_ips = vec![ip];
        }
        debug!(router = %router, "Routing service endpoint");

        let client = build_endpoint_client(&router, timeout)?;
        Ok(Self {
            source_url: source_url.to_string(),
            router,
            client,
        })
    }

    pub fn router(&self) -> &Endpoint {
        &self.router
    }
}

#[async_trait]
impl EndpointProvider for SourceUrlProvider {
    fn name(&self) -> &str {
        &self.source_url
    }

    async fn endpoints(&self) -> Result<Vec<Endpoint>, DomainError> {
        let response = self
            .client
            .get(&self.source_url)
            .send()
            .await
            .map_err(|e| map_send_error(&self.router, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DomainError::ProviderFailed(format!(
                "{} returned HTTP {}",
                self.source_url,
                status.as_u16()
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| DomainError::ProviderFailed(e.to_string()))?;
        parse_endpoint_list(&body)
    }
}

/// Decodes a routing service answer: a JSON array of endpoint spec strings.
/// Entries that do not parse are skipped.
pub fn parse_endpoint_list(body: &[u8]) -> Result<Vec<Endpoint>, DomainError> {
    let specs: Vec<String> = serde_json::from_slice(body)
        .map_err(|e| DomainError::ProviderFailed(format!("Invalid endpoint list: {}", e)))?;

    Ok(specs
        .iter()
        .filter_map(|spec| match spec.parse::<Endpoint>() {
            Ok(endpoint) => Some(endpoint),
            Err(e) => {
                warn!(spec = %spec, error = %e, "Skipping endpoint from routing service");
                None
            }
        })
        .collect())
}
