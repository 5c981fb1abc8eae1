//! NATS-backed subscription.
//!
//! [`NatsSubscription`] wraps an `async-nats` client and subscriber.
//! Acknowledgment publishes `+ACK` to the message's reply subject, which is
//! how JetStream push consumers expect to be acknowledged. Only reply
//! subjects under `$JS.ACK.` are acknowledged; a core NATS request carries
//! the requester's inbox as its reply subject, and answering it with `+ACK`
//! would hand the requester a bogus response.

use futures::StreamExt;

use crate::bus::{validate_subject, Acknowledger, BusError, BusMessage, Subscription};

/// Payload of a positive JetStream acknowledgment.
const ACK_PAYLOAD: &str = "+ACK";

/// Prefix of the reply subjects JetStream attaches to deliveries.
const JS_ACK_PREFIX: &str = "$JS.ACK.";

/// Subject to publish the acknowledgment to, if the message needs one.
fn ack_subject(message: &BusMessage) -> Option<&str> {
    message
        .reply
        .as_deref()
        .filter(|reply| reply.starts_with(JS_ACK_PREFIX))
}

/// Live subscription to a NATS subject pattern.
pub struct NatsSubscription {
    client: async_nats::Client,
    subscriber: async_nats::Subscriber,
    subject: String,
}

impl NatsSubscription {
    /// Connect to the server at `url` and subscribe to `subject`.
    pub async fn connect(url: &str, subject: &str) -> Result<Self, BusError> {
        validate_subject(subject)?;

        let client = async_nats::connect(url)
            .await
            .map_err(|e| BusError::Connect(e.to_string()))?;

        let subscriber = client
            .subscribe(subject.to_string())
            .await
            .map_err(|e| BusError::Subscribe(e.to_string()))?;

        tracing::info!(url, subject, "Subscribed to NATS subject");

        Ok(Self {
            client,
            subscriber,
            subject: subject.to_string(),
        })
    }

    /// The underlying client, e.g. to flush pending acknowledgments on
    /// shutdown.
    pub fn client(&self) -> &async_nats::Client {
        &self.client
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}

impl Subscription for NatsSubscription {
    type Acker = NatsAcker;

    fn acknowledger(&self) -> NatsAcker {
        NatsAcker {
            client: self.client.clone(),
        }
    }

    async fn next_message(&mut self) -> Option<BusMessage> {
        let message = self.subscriber.next().await?;
        Some(BusMessage {
            subject: message.subject.to_string(),
            payload: message.payload.to_vec(),
            reply: message.reply.map(|reply| reply.to_string()),
        })
    }
}

/// Acknowledges messages by replying on the client connection.
#[derive(Clone)]
pub struct NatsAcker {
    client: async_nats::Client,
}

impl Acknowledger for NatsAcker {
    async fn ack(&self, message: &BusMessage) -> Result<(), BusError> {
        let Some(subject) = ack_subject(message) else {
            tracing::debug!(subject = %message.subject, "Message is not a JetStream delivery; nothing to acknowledge");
            return Ok(());
        };

        self.client
            .publish(subject.to_string(), ACK_PAYLOAD.into())
            .await
            .map_err(|e| BusError::Ack(e.to_string()))
    }
}
