use bytes::Bytes;
use ferrous_doh_domain::packet::mark_truncated;
use ferrous_doh_domain::{DeviceIdentity, DomainError};
use std::sync::RwLock;
use tracing::debug;

use crate::ports::{DohRequest, ResponseStream, UpstreamTransport};

pub const DNS_MESSAGE_CONTENT_TYPE: &str = "application/dns-packet";

#[derive(Debug, Clone)]
struct ExchangeSettings {
    url: String,
    headers: Vec<(&'static str, String)>,
}

/// Sends one DNS message to the upstream resolver as an RFC 8484 POST.
///
/// The upstream URL and the identity headers are the only settings that
/// change at runtime; both sit behind a lock and are read once per query.
pub struct UpstreamExchange {
    settings: RwLock<ExchangeSettings>,
}

impl UpstreamExchange {
    pub fn new(url: impl Into<String>, identity: &DeviceIdentity) -> Self {
        Self {
            settings: RwLock::new(ExchangeSettings {
                url: url.into(),
                headers: identity.headers(),
            }),
        }
    }

    pub fn url(&self) -> String {
        self.settings
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .url
            .clone()
    }

    pub fn set_url(&self, url: impl Into<String>) {
        self.settings.write().unwrap_or_else(|e| e.into_inner()).url = url.into();
    }

    pub fn set_identity(&self, identity: &DeviceIdentity) {
        self.settings
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .headers = identity.headers();
    }

    pub fn headers(&self) -> Vec<(&'static str, String)> {
        self.settings
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .headers
            .clone()
    }

    /// Posts `query` and hands back the response body when the upstream
    /// answered 200.
    pub async fn resolve(
        &self,
        transport: &dyn UpstreamTransport,
        query: &[u8],
    ) -> Result<Box<dyn ResponseStream>, DomainError> {
        let request = {
            let settings = self.settings.read().unwrap_or_else(|e| e.into_inner());
            let mut headers = Vec::with_capacity(settings.headers.len() + 1);
            headers.push(("Content-Type", DNS_MESSAGE_CONTENT_TYPE.to_string()));
            headers.extend(settings.headers.iter().cloned());
            DohRequest {
                url: settings.url.clone(),
                headers,
                body: Bytes::copy_from_slice(query),
            }
        };

        let response = transport.round_trip(request).await?;
        if response.status != 200 {
            debug!(status = response.status, "Upstream rejected query");
            return Err(DomainError::UpstreamStatus(response.status));
        }
        Ok(response.body)
    }
}

/// Copies a response body into `buf`, returning the number of bytes written.
///
/// A body larger than `buf` is cut at `buf.len()` and the DNS truncation bit
/// is set on what was kept, so the client retries over TCP.
pub async fn read_dns_response(
    body: &mut dyn ResponseStream,
    buf: &mut [u8],
) -> Result<usize, DomainError> {
    let mut len = 0;
    let mut truncated = false;

    while let Some(chunk) = body.next_chunk().await? {
        let room = buf.len() - len;
        if chunk.len() > room {
            buf[len..].copy_from_slice(&chunk[..room]);
            len = buf.len();
            truncated = true;
            break;
        }
        buf[len..len + chunk.len()].copy_from_slice(&chunk);
        len += chunk.len();
    }

    if truncated {
        mark_truncated(&mut buf[..len]);
    }
    Ok(len)
}
