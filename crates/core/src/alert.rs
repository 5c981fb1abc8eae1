//! Alert subscriptions returned by the lookup service.

use serde::{Deserialize, Serialize};

/// A recipient's registered interest in notifications for one resource.
///
/// Produced fresh for every lookup; never cached or persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Alert {
    pub id: String,
    /// Address the notification is sent to.
    pub email: String,
    pub resource_id: String,
    /// Opaque classification assigned by the lookup service.
    pub oll: String,
}
