//! Wire message types and parser for the job event channel.
//!
//! The backend sends JSON text frames shaped
//! `{"type": "<kind>", "data": {...}}`. This module deserializes them
//! into a strongly-typed [`StreamMessage`] enum.

use serde::Deserialize;

use pulse_core::snapshot::{JobStatus, ProgressSnapshot};

/// All named event kinds on the job event channel.
///
/// Deserialized via the adjacently-tagged `"type"` field with
/// associated `"data"` content. The `connected` kind carries no
/// payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum StreamMessage {
    /// The channel is established (or re-established) server-side.
    Connected,

    /// One authoritative progress snapshot.
    Progress(ProgressSnapshot),

    /// Terminal: the job reached a final status.
    Done(DoneData),

    /// Named in-band error (e.g. "job not found"). The server closes
    /// the channel after sending this.
    Error(ErrorData),
}

/// Payload for `done` messages.
#[derive(Debug, Clone, Deserialize)]
pub struct DoneData {
    pub status: JobStatus,
}

/// Payload for `error` messages.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorData {
    pub message: String,
}

/// Parse a text frame from the event channel into a typed message.
///
/// Returns `Err` for malformed JSON or unknown `type` values. Callers
/// log and drop those; they never close the channel.
pub fn parse_message(text: &str) -> Result<StreamMessage, serde_json::Error> {
    serde_json::from_str(text)
}
