//! Herald bus consumption and notification delivery.
//!
//! This crate provides the building blocks of the relay:
//!
//! - [`bus`]: the [`Subscription`] seam, subject wildcards, and the
//!   in-process [`LocalBus`] test double.
//! - [`nats`]: [`NatsSubscription`], the production bus adapter.
//! - [`lookup`]: [`AlertsClient`], recipient resolution over HTTP.
//! - [`render`]: [`TemplateRenderer`], Handlebars templates with a YAML
//!   preamble.
//! - [`delivery`]: [`MailDispatcher`], the outbound mail service client.
//! - [`pipeline`]: [`Pipeline`], the per-message decode/resolve/render/
//!   dispatch sequence and its [`FailurePolicy`].
//! - [`consumer`]: [`Consumer`], the bounded loop tying a subscription to
//!   a pipeline.

pub mod bus;
pub mod consumer;
pub mod delivery;
pub mod lookup;
pub mod nats;
pub mod pipeline;
pub mod render;

pub use bus::{Acknowledger, BusError, BusMessage, LocalBus, Subscription};
pub use consumer::Consumer;
pub use delivery::mail::{DispatchError, MailConfig, MailDispatcher, MailSender};
pub use lookup::{AlertsClient, RecipientLookup, ResolveError};
pub use nats::NatsSubscription;
pub use pipeline::{DecodeFailure, FailurePolicy, HandleReport, Pipeline};
pub use render::{RenderError, TemplateRenderer, EVENT_MODIFIED};
