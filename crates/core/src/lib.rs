//! Herald domain types.
//!
//! Plain data shared by the relay pipeline: the [`Event`] carried on the
//! bus, the [`Alert`] subscriptions returned by the lookup service, and
//! the [`RenderedMessage`] handed to the mail dispatcher. Nothing in this
//! crate performs I/O.

pub mod alert;
pub mod event;
pub mod message;

pub use alert::Alert;
pub use event::{DecodeError, Event};
pub use message::RenderedMessage;
