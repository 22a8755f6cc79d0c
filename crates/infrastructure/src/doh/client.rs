use ferrous_doh_domain::{DomainError, Endpoint};
use std::time::Duration;

/// HTTP/2 client dedicated to one endpoint.
///
/// Bootstrap addresses are pinned into the client's resolver, so connecting
/// to a bootstrapped endpoint never issues a DNS lookup. TLS still verifies
/// the endpoint hostname.
pub fn build_endpoint_client(
    endpoint: &Endpoint,
    timeout: Duration,
) -> Result<reqwest::Client, DomainError> {
    let mut builder = reqwest::Client::builder()
        .use_rustls_tls()
        .timeout(timeout)
        .pool_max_idle_per_host(4);

    if endpoint.is_bootstrapped() {
        builder = builder.resolve_to_addrs(&endpoint.hostname, &endpoint.bootstrap_addrs());
    }

    builder.build().map_err(|e| {
        DomainError::UpstreamTransport(format!(
            "Cannot build client for {}: {}",
            endpoint.hostname, e
        ))
    })
}

pub(crate) fn map_send_error(endpoint: &Endpoint, error: reqwest::Error) -> DomainError {
    if error.is_timeout() {
        DomainError::UpstreamTimeout {
            server: endpoint.hostname.to_string(),
        }
    } else {
        DomainError::UpstreamTransport(error.to_string())
    }
}
