//! Events surfaced to subscription consumers.
//!
//! These represent the state changes a renderer cares about, produced
//! by the frame processor and the reconnect policy after interpreting
//! raw WebSocket traffic.

use serde::Serialize;

use pulse_core::snapshot::{ConnectionState, JobStatus, ProgressSnapshot};

/// A consumer-facing event from one job subscription.
#[derive(Debug, Clone, Serialize)]
pub enum StreamEvent {
    /// The connection state machine transitioned.
    State(ConnectionState),

    /// The server acknowledged the channel (sent on every establish
    /// and re-establish). Receiving it resets the retry counter; the
    /// reset itself never re-triggers channel setup.
    Connected,

    /// One authoritative progress snapshot, normalized to valid ranges.
    Progress(ProgressSnapshot),

    /// Terminal: the job completed. Carries the last known snapshot.
    Completed { last: Option<ProgressSnapshot> },

    /// Terminal: the job ended with a non-completed status; the
    /// renderer branches on it.
    Terminated { status: JobStatus },

    /// Named in-band error from the server (e.g. "job not found").
    /// The channel is assumed already closed server-side.
    JobError { message: String },

    /// The bounded retry policy gave up. Emitted exactly once per
    /// subscription.
    RetriesExhausted,
}
