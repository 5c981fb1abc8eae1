//! Relay configuration loaded from the environment.
//!
//! Every variable is read once at startup through [`RelayConfig::from_env`].
//! Invalid or missing values are reported as [`ConfigError`] before the relay
//! touches the bus.

use std::time::Duration;

use herald_events::bus::validate_subject;
use herald_events::consumer::DEFAULT_MAX_IN_FLIGHT;
use herald_events::delivery::mail::DEFAULT_REQUEST_TIMEOUT;
use herald_events::{DecodeFailure, FailurePolicy, MailConfig};
use tokio::sync::Semaphore;

use crate::telemetry::LogFormat;

const DEFAULT_NATS_URL: &str = "nats://127.0.0.1:4222";
const DEFAULT_NATS_SUBJECT: &str = "USERS.*";
const DEFAULT_ALERTS_API_URL: &str = "http://localhost:8080/alerts";
const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Error raised while loading or validating [`RelayConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{name} must be {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Relay configuration loaded from environment variables.
///
/// Loaded once at startup and validated before the bus subscription is
/// opened. Endpoints have local-development defaults; the mail credentials
/// never do.
#[derive(Clone)]
pub struct RelayConfig {
    /// NATS server URL.
    pub nats_url: String,
    /// Subject pattern to subscribe to; wildcards allowed.
    pub nats_subject: String,
    /// Alert-lookup endpoint queried with `?resource_ids=`.
    pub alerts_api_url: String,
    /// Mail-sending endpoint.
    pub mail_api_url: String,
    /// Bearer token for the mail endpoint.
    pub mail_auth_token: String,
    /// Timeout applied to every outbound HTTP request.
    pub request_timeout: Duration,
    /// Upper bound on messages handled concurrently.
    pub max_in_flight: usize,
    /// Acknowledge messages whose payload cannot be decoded.
    pub ack_malformed_messages: bool,
    /// How long to wait for in-flight messages on shutdown.
    pub shutdown_timeout: Duration,
    pub log_format: LogFormat,
}

impl RelayConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                  | Default                         |
    /// |--------------------------|---------------------------------|
    /// | `NATS_URL`               | `nats://127.0.0.1:4222`         |
    /// | `NATS_SUBJECT`           | `USERS.*`                       |
    /// | `ALERTS_API_URL`         | `http://localhost:8080/alerts`  |
    /// | `MAIL_API_URL`           | required                        |
    /// | `MAIL_AUTH_TOKEN`        | required                        |
    /// | `REQUEST_TIMEOUT_SECS`   | `10`                            |
    /// | `MAX_IN_FLIGHT`          | `1`                             |
    /// | `ACK_MALFORMED_MESSAGES` | `false`                         |
    /// | `SHUTDOWN_TIMEOUT_SECS`  | `30`                            |
    /// | `LOG_FORMAT`             | `text`                          |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let nats_url = var("NATS_URL").unwrap_or_else(|| DEFAULT_NATS_URL.into());

        let nats_subject = var("NATS_SUBJECT").unwrap_or_else(|| DEFAULT_NATS_SUBJECT.into());
        validate_subject(&nats_subject).map_err(|_| ConfigError::Invalid {
            name: "NATS_SUBJECT",
            expected: "a valid subject pattern",
            value: nats_subject.clone(),
        })?;

        let alerts_api_url = http_url(
            "ALERTS_API_URL",
            var("ALERTS_API_URL").unwrap_or_else(|| DEFAULT_ALERTS_API_URL.into()),
        )?;

        let mail_api_url = http_url(
            "MAIL_API_URL",
            var("MAIL_API_URL").ok_or(ConfigError::Missing("MAIL_API_URL"))?,
        )?;

        let mail_auth_token =
            var("MAIL_AUTH_TOKEN").ok_or(ConfigError::Missing("MAIL_AUTH_TOKEN"))?;

        let request_timeout = match var("REQUEST_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(positive("REQUEST_TIMEOUT_SECS", &v)?),
            None => DEFAULT_REQUEST_TIMEOUT,
        };

        let max_in_flight = match var("MAX_IN_FLIGHT") {
            Some(v) => max_in_flight(&v)?,
            None => DEFAULT_MAX_IN_FLIGHT,
        };

        let ack_malformed_messages = match var("ACK_MALFORMED_MESSAGES") {
            Some(v) => boolean("ACK_MALFORMED_MESSAGES", &v)?,
            None => false,
        };

        let shutdown_timeout = Duration::from_secs(match var("SHUTDOWN_TIMEOUT_SECS") {
            Some(v) => positive("SHUTDOWN_TIMEOUT_SECS", &v)?,
            None => DEFAULT_SHUTDOWN_TIMEOUT_SECS,
        });

        let log_format = match var("LOG_FORMAT") {
            Some(v) => v.parse().map_err(|_| ConfigError::Invalid {
                name: "LOG_FORMAT",
                expected: "`text` or `json`",
                value: v,
            })?,
            None => LogFormat::default(),
        };

        Ok(Self {
            nats_url,
            nats_subject,
            alerts_api_url,
            mail_api_url,
            mail_auth_token,
            request_timeout,
            max_in_flight,
            ack_malformed_messages,
            shutdown_timeout,
            log_format,
        })
    }

    /// Settings for the mail dispatcher.
    pub fn mail_config(&self) -> MailConfig {
        MailConfig {
            api_url: self.mail_api_url.clone(),
            auth_token: self.mail_auth_token.clone(),
            timeout: self.request_timeout,
        }
    }

    /// Acknowledgment policy derived from `ack_malformed_messages`.
    pub fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy {
            on_decode_failure: if self.ack_malformed_messages {
                DecodeFailure::Acknowledge
            } else {
                DecodeFailure::LeaveUnacknowledged
            },
        }
    }
}

impl std::fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayConfig")
            .field("nats_url", &self.nats_url)
            .field("nats_subject", &self.nats_subject)
            .field("alerts_api_url", &self.alerts_api_url)
            .field("mail_api_url", &self.mail_api_url)
            .field("mail_auth_token", &"<redacted>")
            .field("request_timeout", &self.request_timeout)
            .field("max_in_flight", &self.max_in_flight)
            .field("ack_malformed_messages", &self.ack_malformed_messages)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .field("log_format", &self.log_format)
            .finish()
    }
}

fn http_url(name: &'static str, value: String) -> Result<String, ConfigError> {
    match reqwest::Url::parse(&value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(value),
        _ => Err(ConfigError::Invalid {
            name,
            expected: "an http(s) URL",
            value,
        }),
    }
}

fn max_in_flight(value: &str) -> Result<usize, ConfigError> {
    let n = positive("MAX_IN_FLIGHT", value)?;
    match usize::try_from(n) {
        Ok(n) if n <= Semaphore::MAX_PERMITS => Ok(n),
        _ => Err(ConfigError::Invalid {
            name: "MAX_IN_FLIGHT",
            expected: "a positive integer within the permit limit",
            value: value.to_string(),
        }),
    }
}

fn positive(name: &'static str, value: &str) -> Result<u64, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::Invalid {
            name,
            expected: "a positive integer",
            value: value.to_string(),
        }),
    }
}

fn boolean(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            expected: "a boolean",
            value: value.to_string(),
        }),
    }
}
