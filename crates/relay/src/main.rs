//! `herald-relay` -- resource event notification relay.
//!
//! Subscribes to resource events on NATS, looks up the users subscribed to
//! the affected resources, and emails each of them a rendered notification
//! through the mail-sending service. See [`RelayConfig::from_env`] for the
//! environment variables it reads.

use herald_events::{AlertsClient, Consumer, MailDispatcher, NatsSubscription, Pipeline, TemplateRenderer};
use tokio_util::sync::CancellationToken;

use herald_relay::config::RelayConfig;
use herald_relay::telemetry;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Configuration + tracing ---
    let config = RelayConfig::from_env();
    telemetry::init(
        config
            .as_ref()
            .map(|c| c.log_format)
            .unwrap_or_default(),
    );

    let config = config.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    });
    tracing::info!(?config, "Loaded relay configuration");

    // --- Pipeline ---
    let renderer = TemplateRenderer::new().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to load notification templates");
        std::process::exit(1);
    });

    let lookup = AlertsClient::new(config.alerts_api_url.clone(), config.request_timeout)
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to build alert lookup client");
            std::process::exit(1);
        });

    let mailer = MailDispatcher::new(config.mail_config()).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to build mail dispatcher");
        std::process::exit(1);
    });

    let consumer = Consumer::new(Pipeline::new(lookup, mailer, renderer))
        .with_policy(config.failure_policy())
        .with_max_in_flight(config.max_in_flight);

    // --- Bus ---
    let subscription = NatsSubscription::connect(&config.nats_url, &config.nats_subject)
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, url = %config.nats_url, "Failed to subscribe");
            std::process::exit(1);
        });
    let client = subscription.client().clone();

    // --- Consume until shutdown ---
    let cancel = CancellationToken::new();
    let mut consumer_handle = tokio::spawn(consumer.run(subscription, cancel.clone()));

    tokio::select! {
        () = shutdown_signal() => {
            cancel.cancel();
            if tokio::time::timeout(config.shutdown_timeout, &mut consumer_handle)
                .await
                .is_err()
            {
                tracing::warn!("In-flight messages did not finish before the shutdown timeout");
                consumer_handle.abort();
            }
        }
        result = &mut consumer_handle => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Consumer task failed");
            }
            tracing::warn!("Subscription ended, shutting down");
        }
    }

    // Push out acknowledgments still buffered on the connection.
    if let Err(e) = client.flush().await {
        tracing::warn!(error = %e, "Failed to flush NATS connection");
    }

    tracing::info!("Relay stopped");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
