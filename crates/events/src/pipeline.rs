//! Per-message notification pipeline.
//!
//! [`Pipeline::handle`] takes one bus message through
//! `decode → resolve → (render + dispatch)*` and reports what happened.
//! Failures degrade according to fixed rules:
//!
//! - decode failure: the message is abandoned before any lookup;
//! - resolve failure: treated as zero recipients;
//! - render or dispatch failure: only that recipient is skipped.
//!
//! Whether the message is then acknowledged is decided by
//! [`FailurePolicy`]; the pipeline itself never touches the bus.

use herald_core::{Alert, Event};

use crate::bus::BusMessage;
use crate::delivery::mail::MailSender;
use crate::lookup::RecipientLookup;
use crate::render::{TemplateRenderer, EVENT_MODIFIED};

// ---------------------------------------------------------------------------
// FailurePolicy
// ---------------------------------------------------------------------------

/// What to do with a message whose payload cannot be decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DecodeFailure {
    /// Log and leave the message unacknowledged. The bus may redeliver it.
    #[default]
    LeaveUnacknowledged,
    /// Log and acknowledge so the message is not redelivered.
    Acknowledge,
}

/// Acknowledgment rules applied after a message has been handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailurePolicy {
    pub on_decode_failure: DecodeFailure,
}

impl FailurePolicy {
    /// Whether a handled message should be acknowledged.
    ///
    /// Every message that decoded is acknowledged, regardless of how many
    /// lookups, renders, or dispatches failed along the way.
    pub fn should_ack(&self, report: &HandleReport) -> bool {
        report.decoded || self.on_decode_failure == DecodeFailure::Acknowledge
    }
}

// ---------------------------------------------------------------------------
// HandleReport
// ---------------------------------------------------------------------------

/// Outcome of handling one bus message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandleReport {
    /// The payload decoded into an event.
    pub decoded: bool,
    /// The lookup failed and was treated as zero recipients.
    pub resolve_failed: bool,
    /// Alerts returned by the lookup (one dispatch attempt each).
    pub recipients: usize,
    /// Messages accepted by the mail service.
    pub dispatched: usize,
    pub render_failures: usize,
    pub dispatch_failures: usize,
}

impl HandleReport {
    /// Dispatch attempts made, successful or not.
    pub fn attempts(&self) -> usize {
        self.dispatched + self.dispatch_failures
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Wires recipient lookup, rendering, and mail delivery together.
pub struct Pipeline<L, M> {
    lookup: L,
    mailer: M,
    renderer: TemplateRenderer,
    template: String,
}

impl<L, M> Pipeline<L, M>
where
    L: RecipientLookup,
    M: MailSender,
{
    /// Create a pipeline rendering with the `event_modified` template.
    pub fn new(lookup: L, mailer: M, renderer: TemplateRenderer) -> Self {
        Self {
            lookup,
            mailer,
            renderer,
            template: EVENT_MODIFIED.to_string(),
        }
    }

    /// Render with a different template.
    pub fn with_template(mut self, name: impl Into<String>) -> Self {
        self.template = name.into();
        self
    }

    /// Handle a single bus message.
    pub async fn handle(&self, message: &BusMessage) -> HandleReport {
        let mut report = HandleReport::default();

        let event = match Event::decode(&message.payload) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(
                    subject = %message.subject,
                    error = %e,
                    "Dropping undecodable event"
                );
                return report;
            }
        };
        report.decoded = true;

        tracing::info!(
            subject = %message.subject,
            event_id = %event.id,
            summary = %event.summary,
            resource_count = event.resource_ids.len(),
            "Event received"
        );

        let alerts = match self.resolve(&event).await {
            Some(alerts) => alerts,
            None => {
                report.resolve_failed = true;
                Vec::new()
            }
        };
        report.recipients = alerts.len();

        for alert in &alerts {
            self.notify(alert, &event, &mut report).await;
        }

        tracing::info!(
            event_id = %event.id,
            recipients = report.recipients,
            dispatched = report.dispatched,
            render_failures = report.render_failures,
            dispatch_failures = report.dispatch_failures,
            "Event handled"
        );

        report
    }

    /// Look up subscribed alerts, returning `None` when the lookup failed.
    async fn resolve(&self, event: &Event) -> Option<Vec<Alert>> {
        match self.lookup.alerts_for_resources(&event.resource_ids).await {
            Ok(alerts) => Some(alerts),
            Err(e) => {
                tracing::error!(
                    event_id = %event.id,
                    error = %e,
                    "Alert lookup failed, treating as no recipients"
                );
                None
            }
        }
    }

    /// Render and send one notification. Failures only affect this alert.
    async fn notify(&self, alert: &Alert, event: &Event, report: &mut HandleReport) {
        let message = match self.renderer.render(&self.template, event) {
            Ok(message) => message,
            Err(e) => {
                tracing::error!(
                    event_id = %event.id,
                    alert_id = %alert.id,
                    template = %self.template,
                    error = %e,
                    "Failed to render notification"
                );
                report.render_failures += 1;
                return;
            }
        };

        match self.mailer.send(&alert.email, &message).await {
            Ok(()) => report.dispatched += 1,
            Err(e) => {
                tracing::error!(
                    event_id = %event.id,
                    alert_id = %alert.id,
                    to = %alert.email,
                    error = %e,
                    "Failed to send notification email"
                );
                report.dispatch_failures += 1;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
