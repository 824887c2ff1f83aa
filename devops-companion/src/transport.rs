//! HTTP transport for the enrichment providers, backed by `reqwest`.
//!
//! Builds nothing itself: requests arrive fully shaped from
//! [`devops_companion_core::enrich`]. One call, one round-trip, no retries.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use devops_companion_core::contract::{HttpMethod, HttpReply, HttpRequest, Transport, TransportError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        tracing::debug!(timeout_secs = REQUEST_TIMEOUT.as_secs(), "Initialised HttpClient");
        Ok(Self { client })
    }
}

fn transport_error(url: &str, e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout {
            url: url.to_string(),
        }
    } else {
        TransportError::Request {
            url: url.to_string(),
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpReply, TransportError> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| transport_error(&request.url, e))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(&request.url, e))?;
        tracing::debug!(url = %request.url, status, "HTTP exchange finished");
        Ok(HttpReply { status, body })
    }
}
