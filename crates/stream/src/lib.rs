//! WebSocket subscription to the backend's per-job event channel.
//!
//! Provides typed wire-message parsing, connection establishment,
//! bounded exponential-backoff reconnection, the frame-processing
//! loop, and the consumer-facing subscription API.

pub mod client;
pub mod events;
pub mod messages;
pub mod processor;
pub mod reconnect;
pub mod subscriber;
