//! Outbound delivery of rendered notifications.
//!
//! Only the HTTP mail service is supported today; each recipient gets one
//! independent attempt.

pub mod mail;
