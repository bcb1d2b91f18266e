//! Network seam for delivering queued payloads.

use std::time::Duration;

use serde_json::Value;

use crate::config::NetworkConfig;
use crate::error::{DeliveryError, QueueError};

/// Delivers payloads to the backend.
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send + Sync {
    /// POST `body` as JSON to `path`. Only the status matters; the response
    /// body is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Transport`] if no response arrived, or
    /// [`DeliveryError::Status`] for any non-2xx status.
    fn post_json(&self, path: &str, body: &Value) -> Result<(), DeliveryError>;

    /// Whether a GET to `path` currently succeeds.
    fn probe(&self, path: &str) -> bool;
}

/// Blocking HTTP transport.
pub struct HttpTransport {
    base_url: String,
    http_client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Create a transport for `base_url`.
    ///
    /// `timeout` of `None` leaves requests without a deadline.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, QueueError> {
        let http_client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| QueueError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    /// Create a transport from the `network` config section.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &NetworkConfig) -> Result<Self, QueueError> {
        Self::new(
            &config.base_url,
            config.timeout_secs.map(Duration::from_secs),
        )
    }

    /// Absolute URL for an endpoint path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl Transport for HttpTransport {
    fn post_json(&self, path: &str, body: &Value) -> Result<(), DeliveryError> {
        let url = self.url(path);

        let response = self
            .http_client
            .post(&url)
            .json(body)
            .send()
            .map_err(|e| DeliveryError::Transport(format!("POST {url}: {e}")))?;

        if !response.status().is_success() {
            return Err(DeliveryError::Status(response.status().as_u16()));
        }

        Ok(())
    }

    fn probe(&self, path: &str) -> bool {
        self.http_client
            .get(self.url(path))
            .send()
            .is_ok_and(|response| response.status().is_success())
    }
}
