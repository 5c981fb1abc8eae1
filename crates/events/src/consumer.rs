//! Bounded consumer loop driving the pipeline from a bus subscription.
//!
//! [`Consumer::run`] pulls messages from a [`Subscription`], handles each on
//! its own task, and acknowledges it according to the [`FailurePolicy`]. At
//! most `max_in_flight` messages are handled concurrently; with the default
//! of one, messages are handled strictly in delivery order.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::bus::{Acknowledger, Subscription};
use crate::delivery::mail::MailSender;
use crate::lookup::RecipientLookup;
use crate::pipeline::{FailurePolicy, Pipeline};

/// Default number of messages handled concurrently.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 1;

/// Runs a [`Pipeline`] against a bus subscription.
pub struct Consumer<L, M> {
    pipeline: Arc<Pipeline<L, M>>,
    policy: FailurePolicy,
    max_in_flight: usize,
}

impl<L, M> Consumer<L, M>
where
    L: RecipientLookup + 'static,
    M: MailSender + 'static,
{
    pub fn new(pipeline: Pipeline<L, M>) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            policy: FailurePolicy::default(),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Bound concurrent message handling. The value is clamped to
    /// `1..=Semaphore::MAX_PERMITS`.
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.clamp(1, Semaphore::MAX_PERMITS);
        self
    }

    /// Run the consume loop.
    ///
    /// Returns when the subscription closes or `cancel` fires. Handlers
    /// already started are awaited before returning, so their messages are
    /// still acknowledged.
    pub async fn run<S: Subscription>(self, mut subscription: S, cancel: CancellationToken) {
        let semaphore = Arc::new(Semaphore::new(self.max_in_flight));
        let acker = subscription.acknowledger();
        let mut tasks = JoinSet::new();

        tracing::info!(max_in_flight = self.max_in_flight, "Consumer started");

        loop {
            let permit = tokio::select! {
                _ = cancel.cancelled() => break,
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let message = tokio::select! {
                _ = cancel.cancelled() => break,
                message = subscription.next_message() => match message {
                    Some(message) => message,
                    None => {
                        tracing::info!("Subscription closed");
                        break;
                    }
                },
            };

            let pipeline = Arc::clone(&self.pipeline);
            let acker = acker.clone();
            let policy = self.policy;

            tasks.spawn(async move {
                let report = pipeline.handle(&message).await;

                if policy.should_ack(&report) {
                    if let Err(e) = acker.ack(&message).await {
                        tracing::error!(subject = %message.subject, error = %e, "Failed to acknowledge message");
                    }
                } else {
                    tracing::warn!(subject = %message.subject, "Message left unacknowledged");
                }

                drop(permit);
            });

            while let Some(result) = tasks.try_join_next() {
                log_join_result(result);
            }
        }

        if !tasks.is_empty() {
            tracing::info!(in_flight = tasks.len(), "Draining in-flight messages");
        }
        while let Some(result) = tasks.join_next().await {
            log_join_result(result);
        }

        tracing::info!("Consumer stopped");
    }
}

fn log_join_result(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        tracing::error!(error = %e, "Message handler task failed");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
