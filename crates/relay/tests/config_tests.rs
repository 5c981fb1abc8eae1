//! Tests for loading and validating [`RelayConfig`].
//!
//! Variables are supplied through [`RelayConfig::from_lookup`] so tests never
//! touch the process environment.

use std::collections::HashMap;
use std::time::Duration;

use assert_matches::assert_matches;
use herald_events::DecodeFailure;
use herald_relay::config::{ConfigError, RelayConfig};
use herald_relay::telemetry::LogFormat;

fn load(vars: &[(&str, &str)]) -> Result<RelayConfig, ConfigError> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    RelayConfig::from_lookup(|name| vars.get(name).cloned())
}

const REQUIRED: [(&str, &str); 2] = [
    ("MAIL_API_URL", "https://mail.example.org/api/send"),
    ("MAIL_AUTH_TOKEN", "s3cret"),
];

fn with_required(extra: &[(&'static str, &'static str)]) -> Vec<(&'static str, &'static str)> {
    REQUIRED.iter().chain(extra.iter()).copied().collect()
}

// ---------------------------------------------------------------------------
// Test: defaults
// ---------------------------------------------------------------------------

#[test]
fn defaults_apply_when_only_required_vars_are_set() {
    let config = load(&REQUIRED).expect("config");

    assert_eq!(config.nats_url, "nats://127.0.0.1:4222");
    assert_eq!(config.nats_subject, "USERS.*");
    assert_eq!(config.alerts_api_url, "http://localhost:8080/alerts");
    assert_eq!(config.request_timeout, Duration::from_secs(10));
    assert_eq!(config.max_in_flight, 1);
    assert!(!config.ack_malformed_messages);
    assert_eq!(config.shutdown_timeout, Duration::from_secs(30));
    assert_eq!(config.log_format, LogFormat::Text);
    assert_eq!(
        config.failure_policy().on_decode_failure,
        DecodeFailure::LeaveUnacknowledged
    );
}

#[test]
fn overrides_are_honoured() {
    let config = load(&with_required(&[
        ("NATS_URL", "nats://bus.internal:4222"),
        ("NATS_SUBJECT", "CALENDAR.>"),
        ("ALERTS_API_URL", "https://config.internal/alerts"),
        ("REQUEST_TIMEOUT_SECS", "3"),
        ("MAX_IN_FLIGHT", "8"),
        ("ACK_MALFORMED_MESSAGES", "true"),
        ("LOG_FORMAT", "json"),
    ]))
    .expect("config");

    assert_eq!(config.nats_url, "nats://bus.internal:4222");
    assert_eq!(config.nats_subject, "CALENDAR.>");
    assert_eq!(config.alerts_api_url, "https://config.internal/alerts");
    assert_eq!(config.request_timeout, Duration::from_secs(3));
    assert_eq!(config.max_in_flight, 8);
    assert_eq!(config.log_format, LogFormat::Json);
    assert_eq!(
        config.failure_policy().on_decode_failure,
        DecodeFailure::Acknowledge
    );

    let mail = config.mail_config();
    assert_eq!(mail.api_url, "https://mail.example.org/api/send");
    assert_eq!(mail.auth_token, "s3cret");
    assert_eq!(mail.timeout, Duration::from_secs(3));
}

// ---------------------------------------------------------------------------
// Test: required variables
// ---------------------------------------------------------------------------

#[test]
fn mail_token_is_required() {
    let err = load(&[("MAIL_API_URL", "https://mail.example.org/api/send")]).unwrap_err();
    assert_matches!(err, ConfigError::Missing("MAIL_AUTH_TOKEN"));
    assert_eq!(err.to_string(), "MAIL_AUTH_TOKEN environment variable is required");
}

#[test]
fn mail_url_is_required() {
    let err = load(&[("MAIL_AUTH_TOKEN", "s3cret")]).unwrap_err();
    assert_matches!(err, ConfigError::Missing("MAIL_API_URL"));
}

#[test]
fn blank_values_count_as_missing() {
    let err = load(&[
        ("MAIL_API_URL", "https://mail.example.org/api/send"),
        ("MAIL_AUTH_TOKEN", "   "),
    ])
    .unwrap_err();
    assert_matches!(err, ConfigError::Missing("MAIL_AUTH_TOKEN"));
}

// ---------------------------------------------------------------------------
// Test: validation
// ---------------------------------------------------------------------------

#[test]
fn invalid_values_are_rejected() {
    let cases = [
        ("ALERTS_API_URL", "localhost:8080/alerts"),
        ("NATS_SUBJECT", "USERS..*"),
        ("REQUEST_TIMEOUT_SECS", "0"),
        ("MAX_IN_FLIGHT", "many"),
        ("ACK_MALFORMED_MESSAGES", "perhaps"),
        ("SHUTDOWN_TIMEOUT_SECS", "-1"),
        ("LOG_FORMAT", "xml"),
    ];

    for (name, value) in cases {
        let err = load(&with_required(&[(name, value)])).unwrap_err();
        assert_matches!(
            err,
            ConfigError::Invalid { name: n, .. } if n == name,
            "{name}={value} should be rejected"
        );
    }
}

#[test]
fn max_in_flight_above_the_permit_limit_is_rejected() {
    let too_many = (tokio::sync::Semaphore::MAX_PERMITS as u64 + 1).to_string();
    let err = load(&[
        REQUIRED[0],
        REQUIRED[1],
        ("MAX_IN_FLIGHT", too_many.as_str()),
    ])
    .unwrap_err();
    assert_matches!(err, ConfigError::Invalid { name: "MAX_IN_FLIGHT", .. });

    let err = load(&with_required(&[("MAX_IN_FLIGHT", "18446744073709551615")])).unwrap_err();
    assert_matches!(err, ConfigError::Invalid { name: "MAX_IN_FLIGHT", .. });
}

#[test]
fn max_in_flight_at_the_permit_limit_is_accepted() {
    let limit = tokio::sync::Semaphore::MAX_PERMITS.to_string();
    let config = load(&[REQUIRED[0], REQUIRED[1], ("MAX_IN_FLIGHT", limit.as_str())])
        .expect("config");
    assert_eq!(config.max_in_flight, tokio::sync::Semaphore::MAX_PERMITS);
}

#[test]
fn debug_output_redacts_the_token() {
    let config = load(&REQUIRED).expect("config");
    let rendered = format!("{config:?}");
    assert!(!rendered.contains("s3cret"));
    assert!(rendered.contains("<redacted>"));
}
