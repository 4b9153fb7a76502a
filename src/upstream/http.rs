//! HTTP upstream client
//!
//! Thin wrapper over `reqwest` that maps upstream statuses onto the crate
//! error taxonomy: 404 becomes [`Error::NotFound`], any other non-success
//! status becomes [`Error::Status`].

use std::time::Duration;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::{StreamExt, TryStreamExt};
use reqwest::header::ACCEPT;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::registry::ResourceKey;

use super::config::UpstreamConfig;
use super::source::{ByteStream, Source};

const EVENT_STREAM: &str = "text/event-stream";
const JSON: &str = "application/json";

/// HTTP client for one-shot fetches and streaming reads
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    config: UpstreamConfig,
}

impl UpstreamClient {
    /// Create a client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(UpstreamConfig::default())
    }

    /// Create a client with custom configuration
    pub fn with_config(config: UpstreamConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { client, config })
    }

    /// Get the client configuration
    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    /// Fetch a finite body
    pub async fn fetch_bytes(&self, key: &ResourceKey) -> Result<Bytes> {
        let response = self
            .send(key, JSON, Some(self.config.request_timeout))
            .await?;

        Ok(response.bytes().await?)
    }

    /// Fetch a finite body and decode it as JSON
    pub async fn fetch_json<T: DeserializeOwned>(&self, key: &ResourceKey) -> Result<T> {
        let body = self.fetch_bytes(key).await?;

        Ok(serde_json::from_slice(&body)?)
    }

    /// Open a long-lived event-stream body
    ///
    /// Dropping the returned stream closes the connection.
    pub async fn open_stream(&self, key: &ResourceKey) -> Result<ByteStream> {
        let response = self.send(key, EVENT_STREAM, None).await?;

        tracing::debug!(key = %key, status = %response.status(), "Upstream stream opened");

        Ok(response.bytes_stream().map_err(Error::from).boxed())
    }

    async fn send(
        &self,
        key: &ResourceKey,
        accept: &'static str,
        timeout: Option<Duration>,
    ) -> Result<Response> {
        let mut request = self
            .client
            .request(key.method().clone(), key.url().clone())
            .header(ACCEPT, accept);

        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        check_status(key, request.send().await?)
    }
}

impl Source for UpstreamClient {
    fn open<'a>(&'a self, key: &'a ResourceKey) -> BoxFuture<'a, Result<ByteStream>> {
        Box::pin(self.open_stream(key))
    }
}

fn check_status(key: &ResourceKey, response: Response) -> Result<Response> {
    let status = response.status();

    if status == StatusCode::NOT_FOUND {
        return Err(Error::NotFound {
            url: key.url().to_string(),
        });
    }

    if !status.is_success() {
        return Err(Error::Status {
            url: key.url().to_string(),
            status: status.as_u16(),
        });
    }

    Ok(response)
}
