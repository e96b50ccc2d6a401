//! Shared types for the pulse progress-tracking client.
//!
//! Home of the snapshot value object, the job stage/status enums, and
//! the connection-state machine shared by the stream and display
//! layers.

pub mod snapshot;
pub mod types;
