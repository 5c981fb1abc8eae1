//! Recipient resolution through the alert-lookup HTTP service.
//!
//! [`AlertsClient`] issues a single `GET {base}?resource_ids=a,b,c` request
//! and decodes the JSON array of [`Alert`]s. Errors are returned to the
//! caller; the pipeline decides how to degrade them.

use std::future::Future;
use std::time::Duration;

use herald_core::Alert;
use reqwest::StatusCode;

/// Query parameter carrying the comma-joined resource ids.
const RESOURCE_IDS_PARAM: &str = "resource_ids";

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for recipient lookup failures.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The HTTP request itself failed (network, DNS, timeout, etc.).
    #[error("Alert lookup request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The lookup service answered with something other than 200 OK.
    #[error("Alert lookup returned HTTP {0}")]
    HttpStatus(u16),

    /// The response body was not a JSON array of alerts.
    #[error("Alert lookup returned an invalid body: {0}")]
    Body(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// RecipientLookup
// ---------------------------------------------------------------------------

/// Maps resource identifiers to the alerts subscribed to them.
pub trait RecipientLookup: Send + Sync {
    fn alerts_for_resources(
        &self,
        resource_ids: &[String],
    ) -> impl Future<Output = Result<Vec<Alert>, ResolveError>> + Send;
}

// ---------------------------------------------------------------------------
// AlertsClient
// ---------------------------------------------------------------------------

/// HTTP client for the alert-lookup service.
pub struct AlertsClient {
    client: reqwest::Client,
    api_url: String,
}

impl AlertsClient {
    /// Create a client whose requests give up after `timeout`.
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Result<Self, ResolveError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, api_url))
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
        }
    }
}

impl RecipientLookup for AlertsClient {
    async fn alerts_for_resources(&self, resource_ids: &[String]) -> Result<Vec<Alert>, ResolveError> {
        // Nothing can be subscribed to an empty resource list.
        if resource_ids.is_empty() {
            return Ok(Vec::new());
        }

        let joined = resource_ids.join(",");
        let response = self
            .client
            .get(&self.api_url)
            .query(&[(RESOURCE_IDS_PARAM, joined.as_str())])
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ResolveError::HttpStatus(status.as_u16()));
        }

        let body = response.bytes().await?;
        let alerts: Vec<Alert> = serde_json::from_slice(&body)?;

        tracing::debug!(
            resource_count = resource_ids.len(),
            alert_count = alerts.len(),
            "Resolved alerts"
        );
        Ok(alerts)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
