//! Message bus abstraction and the in-process bus.
//!
//! The relay consumes [`BusMessage`]s from a [`Subscription`] and
//! acknowledges them through the subscription's [`Acknowledger`]. Two
//! implementations exist: [`NatsSubscription`](crate::nats::NatsSubscription)
//! for production and [`LocalBus`], an in-process bus backed by a
//! `tokio::sync::broadcast` channel that honours NATS subject wildcards and
//! records every acknowledgment.

use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// BusMessage
// ---------------------------------------------------------------------------

/// A raw message delivered by the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    /// Concrete subject the message was published on, e.g. `USERS.updated`.
    pub subject: String,

    /// Undecoded payload bytes.
    pub payload: Vec<u8>,

    /// Reply subject used for acknowledgment, when the bus supplied one.
    pub reply: Option<String>,
}

impl BusMessage {
    pub fn new(subject: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            subject: subject.into(),
            payload: payload.into(),
            reply: None,
        }
    }

    /// Attach a reply subject.
    pub fn with_reply(mut self, reply: impl Into<String>) -> Self {
        self.reply = Some(reply.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for bus connection, subscription, and acknowledgment.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// Could not reach the bus server.
    #[error("Bus connection failed: {0}")]
    Connect(String),

    /// The server rejected the subscription.
    #[error("Bus subscription failed: {0}")]
    Subscribe(String),

    /// The acknowledgment could not be published.
    #[error("Bus acknowledgment failed: {0}")]
    Ack(String),

    /// The subject or subject pattern is not valid.
    #[error("Invalid subject: {0:?}")]
    InvalidSubject(String),
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Acknowledges handled messages back to the bus.
///
/// Cloned into every message handler task, so implementations should be
/// cheap handles onto shared state.
pub trait Acknowledger: Clone + Send + Sync + 'static {
    fn ack(&self, message: &BusMessage) -> impl Future<Output = Result<(), BusError>> + Send;
}

/// A stream of messages matching one subject pattern.
pub trait Subscription: Send {
    type Acker: Acknowledger;

    /// Handle used to acknowledge messages received from this subscription.
    fn acknowledger(&self) -> Self::Acker;

    /// Wait for the next message. Returns `None` once the subscription is
    /// closed.
    fn next_message(&mut self) -> impl Future<Output = Option<BusMessage>> + Send;
}

// ---------------------------------------------------------------------------
// Subjects
// ---------------------------------------------------------------------------

/// Check that a subject pattern is well formed.
///
/// Tokens are separated by `.` and must be non-empty. `*` matches exactly
/// one token; `>` matches one or more trailing tokens and may only appear
/// last.
pub fn validate_subject(pattern: &str) -> Result<(), BusError> {
    let tokens: Vec<&str> = pattern.split('.').collect();
    let last = tokens.len() - 1;

    for (idx, token) in tokens.iter().enumerate() {
        let bad = token.is_empty()
            || token.contains(char::is_whitespace)
            || (*token == ">" && idx != last)
            || (token.len() > 1 && (token.contains('*') || token.contains('>')));
        if bad {
            return Err(BusError::InvalidSubject(pattern.to_string()));
        }
    }
    Ok(())
}

/// Whether a concrete `subject` matches a wildcard `pattern`.
pub fn subject_matches(pattern: &str, subject: &str) -> bool {
    let mut subject_tokens = subject.split('.');

    for pattern_token in pattern.split('.') {
        match (pattern_token, subject_tokens.next()) {
            (">", Some(_)) => return true,
            ("*", Some(_)) => {}
            (p, Some(s)) if p == s => {}
            _ => return false,
        }
    }

    subject_tokens.next().is_none()
}

// ---------------------------------------------------------------------------
// LocalBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process bus with NATS-style subjects.
///
/// A test double for [`NatsSubscription`](crate::nats::NatsSubscription):
/// the relay binary never constructs one. It lives in the public API so
/// integration tests and downstream crates can drive a
/// [`Consumer`](crate::Consumer) without a NATS server.
///
/// Every subscription sees every published message whose subject matches
/// its pattern. Acknowledgments from all subscriptions are recorded on the
/// bus and can be inspected with [`LocalBus::acknowledged`]. The record
/// grows without bound, which is fine for tests and wrong for production.
pub struct LocalBus {
    sender: broadcast::Sender<BusMessage>,
    acked: Arc<Mutex<Vec<BusMessage>>>,
}

impl LocalBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow subscriptions log the number of skipped messages.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            acked: Arc::default(),
        }
    }

    /// Publish a message to all current subscriptions.
    ///
    /// If there are no active subscriptions the message is silently dropped.
    pub fn publish(&self, message: BusMessage) {
        // Ignore the SendError: it only means there are zero receivers.
        let _ = self.sender.send(message);
    }

    /// Subscribe to every message whose subject matches `pattern`.
    pub fn subscribe(&self, pattern: &str) -> Result<LocalSubscription, BusError> {
        validate_subject(pattern)?;
        Ok(LocalSubscription {
            pattern: pattern.to_string(),
            receiver: self.sender.subscribe(),
            acker: LocalAcker {
                acked: Arc::clone(&self.acked),
            },
        })
    }

    /// Snapshot of every acknowledged message, in acknowledgment order.
    pub fn acknowledged(&self) -> Vec<BusMessage> {
        snapshot(&self.acked)
    }
}

fn snapshot(acked: &Mutex<Vec<BusMessage>>) -> Vec<BusMessage> {
    acked.lock().map(|acked| acked.clone()).unwrap_or_default()
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Subscription handed out by [`LocalBus::subscribe`].
pub struct LocalSubscription {
    pattern: String,
    receiver: broadcast::Receiver<BusMessage>,
    acker: LocalAcker,
}

impl Subscription for LocalSubscription {
    type Acker = LocalAcker;

    fn acknowledger(&self) -> LocalAcker {
        self.acker.clone()
    }

    async fn next_message(&mut self) -> Option<BusMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(message) if subject_matches(&self.pattern, &message.subject) => {
                    return Some(message)
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(
                        skipped = n,
                        pattern = %self.pattern,
                        "Local bus subscription lagged, some messages were dropped"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Records acknowledgments on the owning [`LocalBus`]. Test double, see
/// [`LocalBus`].
#[derive(Clone)]
pub struct LocalAcker {
    acked: Arc<Mutex<Vec<BusMessage>>>,
}

impl LocalAcker {
    /// Same as [`LocalBus::acknowledged`], usable after the bus is dropped.
    pub fn acknowledged(&self) -> Vec<BusMessage> {
        snapshot(&self.acked)
    }
}

impl Acknowledger for LocalAcker {
    async fn ack(&self, message: &BusMessage) -> Result<(), BusError> {
        let mut acked = self
            .acked
            .lock()
            .map_err(|_| BusError::Ack("acknowledgment log poisoned".to_string()))?;
        acked.push(message.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
