use async_trait::async_trait;
use bytes::Bytes;
use ferrous_doh_application::ports::ResponseStream;
use ferrous_doh_domain::DomainError;

/// Response body read straight off the connection, chunk by chunk.
pub struct ReqwestBodyStream {
    response: reqwest::Response,
}

impl ReqwestBodyStream {
    pub fn new(response: reqwest::Response) -> Self {
        Self { response }
    }
}

#[async_trait]
impl ResponseStream for ReqwestBodyStream {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, DomainError> {
        self.response
            .chunk()
            .await
            .map_err(|e| DomainError::UpstreamRead(e.to_string()))
    }
}
