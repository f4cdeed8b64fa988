//! Outbound client for storage hosts.

use super::protocol::{UploadPlotRequest, ENDPOINT_UPLOAD_PLOT};
use crate::error::TransportError;

use async_trait::async_trait;
use std::time::Duration;

/// Attempts per notification for connection-level failures.
const UPLOAD_ATTEMPTS: usize = 3;

#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Asks `host` to fetch the plot described by `request`.
    async fn upload_plot(
        &self,
        host: &str,
        request: &UploadPlotRequest,
    ) -> Result<(), TransportError>;
}

/// Talks to storage hosts over HTTP.
pub struct HttpStorageClient {
    http_client: reqwest::Client,
    port: u16,
    timeout: Duration,
}

impl HttpStorageClient {
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            port,
            timeout,
        }
    }

    async fn post_with_retry<T: serde::Serialize>(
        &self,
        url: String,
        payload: &T,
        attempts: usize,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let mut delay_ms = 150u64;
        let mut attempt = 0;

        loop {
            let response = self
                .http_client
                .post(url.clone())
                .json(payload)
                .timeout(self.timeout)
                .send()
                .await;

            match response {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    attempt += 1;
                    if attempt >= attempts {
                        return Err(e);
                    }
                    // Simple jitter to prevent thundering herd
                    let jitter = rand::random::<u64>() % 50;
                    tokio::time::sleep(Duration::from_millis(delay_ms + jitter)).await;
                    delay_ms = (delay_ms * 2).min(1200);
                }
            }
        }
    }
}

#[async_trait]
impl StorageClient for HttpStorageClient {
    async fn upload_plot(
        &self,
        host: &str,
        request: &UploadPlotRequest,
    ) -> Result<(), TransportError> {
        let url = format!("http://{}:{}{}", host, self.port, ENDPOINT_UPLOAD_PLOT);

        let response = self
            .post_with_retry(url, request, UPLOAD_ATTEMPTS)
            .await
            .map_err(|source| TransportError::Request {
                host: host.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(TransportError::Rejected {
                host: host.to_string(),
                status: response.status().as_u16(),
            });
        }

        tracing::debug!("Host {} accepted {}", host, request.plot_url);
        Ok(())
    }
}
