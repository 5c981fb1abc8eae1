//! Resource event decoded from a bus payload.

use serde::{Deserialize, Serialize};

/// Error returned when a bus payload is not a well-formed [`Event`].
#[derive(Debug, thiserror::Error)]
#[error("Malformed event payload: {0}")]
pub struct DecodeError(#[from] serde_json::Error);

/// A changed calendar-like resource.
///
/// Field names follow the JSON published on the bus (`dtstart`, `dtend`,
/// `resource_id`). Missing fields decode to empty values; a field with the
/// wrong JSON type rejects the whole payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Event {
    pub id: String,
    pub summary: String,
    pub description: String,
    pub location: String,

    /// Start time, passed through in whatever format the publisher used.
    #[serde(rename = "dtstart")]
    pub start: String,

    /// End time, same format as `start`.
    #[serde(rename = "dtend")]
    pub end: String,

    /// Calendar UID, distinct from `id`.
    pub uid: String,

    /// Resources affected by the change. May be empty.
    #[serde(rename = "resource_id")]
    pub resource_ids: Vec<String>,
}

impl Event {
    /// Decode an event from a raw JSON payload.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// Encode the event back into its wire representation.
    pub fn encode(&self) -> Vec<u8> {
        // A struct of strings always serialises.
        serde_json::to_vec(self).unwrap_or_default()
    }
}
