//! Email delivery through the mail-sending HTTP service.
//!
//! [`MailDispatcher`] serialises `{"to", "subject", "body"}` and POSTs it to
//! the configured endpoint with a bearer token. A single attempt is made per
//! recipient; callers decide what to do with failures.

use std::future::Future;
use std::time::Duration;

use herald_core::RenderedMessage;
use reqwest::StatusCode;
use serde::Serialize;

/// Default HTTP request timeout for a single delivery attempt.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for mail delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The mail service returned a status other than 200 OK.
    #[error("Mail service returned HTTP {0}")]
    HttpStatus(u16),
}

// ---------------------------------------------------------------------------
// MailConfig
// ---------------------------------------------------------------------------

/// Endpoint and credentials for the mail service.
#[derive(Clone)]
pub struct MailConfig {
    /// Full URL of the send endpoint.
    pub api_url: String,
    /// Bearer token sent in the `Authorization` header.
    pub auth_token: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailConfig")
            .field("api_url", &self.api_url)
            .field("auth_token", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// MailSender
// ---------------------------------------------------------------------------

/// Sends one rendered message to one recipient.
pub trait MailSender: Send + Sync {
    fn send(
        &self,
        to: &str,
        message: &RenderedMessage,
    ) -> impl Future<Output = Result<(), DispatchError>> + Send;
}

/// Request body expected by the mail service.
#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    to: &'a str,
    subject: &'a str,
    body: &'a str,
}

// ---------------------------------------------------------------------------
// MailDispatcher
// ---------------------------------------------------------------------------

/// Delivers notification emails through the mail-sending HTTP service.
pub struct MailDispatcher {
    client: reqwest::Client,
    config: MailConfig,
}

impl MailDispatcher {
    /// Create a dispatcher with an HTTP client bounded by `config.timeout`.
    pub fn new(config: MailConfig) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }
}

impl MailSender for MailDispatcher {
    async fn send(&self, to: &str, message: &RenderedMessage) -> Result<(), DispatchError> {
        let payload = SendRequest {
            to,
            subject: &message.subject,
            body: &message.body,
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.auth_token)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(DispatchError::HttpStatus(status.as_u16()));
        }

        tracing::info!(to, "Notification email sent");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
