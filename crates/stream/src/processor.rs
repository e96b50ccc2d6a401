//! Frame-processing loop for the job event channel.
//!
//! Reads raw frames from a live connection, parses them into typed
//! [`StreamMessage`]s, and emits [`StreamEvent`]s to the subscription's
//! consumer. Malformed payloads are logged and dropped; they never
//! close the channel.

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use pulse_core::snapshot::{ConnectionState, JobStatus, ProgressSnapshot};

use crate::client::WsStream;
use crate::events::StreamEvent;
use crate::messages::{parse_message, StreamMessage};

/// Why the frame loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorExit {
    /// The job reached a terminal state; the channel is done and must
    /// not be reconnected.
    Done,
    /// Generic transport failure (network drop, server close without a
    /// named reason); the retry policy applies.
    Transport,
}

/// Process frames from a job event channel until it ends.
///
/// Loops until a terminal `done` message arrives, the WebSocket
/// closes, or a fatal receive error occurs. Each text frame is parsed
/// via [`parse_message`]; the resulting message drives consumer
/// events. Binary frames are ignored.
pub async fn process_messages(
    ws_stream: &mut WsStream,
    job_id: &str,
    last_snapshot: &mut Option<ProgressSnapshot>,
    event_tx: &mpsc::UnboundedSender<StreamEvent>,
) -> ProcessorExit {
    while let Some(msg_result) = ws_stream.next().await {
        match msg_result {
            Ok(Message::Text(text)) => {
                if let Some(exit) = handle_text_message(&text, job_id, last_snapshot, event_tx) {
                    return exit;
                }
            }
            Ok(Message::Binary(_)) => {
                tracing::trace!(job_id, "Ignoring binary frame on event channel");
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => {
                // Handled automatically by tungstenite.
            }
            Ok(Message::Close(frame)) => {
                tracing::info!(job_id, ?frame, "Job event channel closed");
                return ProcessorExit::Transport;
            }
            Ok(Message::Frame(_)) => {}
            Err(e) => {
                tracing::error!(job_id, error = %e, "WebSocket receive error");
                return ProcessorExit::Transport;
            }
        }
    }

    // Stream exhausted without a close frame.
    ProcessorExit::Transport
}

/// Dispatch a single text frame. Returns `Some` when the frame is
/// terminal for the channel.
fn handle_text_message(
    text: &str,
    job_id: &str,
    last_snapshot: &mut Option<ProgressSnapshot>,
    event_tx: &mpsc::UnboundedSender<StreamEvent>,
) -> Option<ProcessorExit> {
    match parse_message(text) {
        Ok(StreamMessage::Connected) => {
            tracing::debug!(job_id, "Server acknowledged event channel");
            let _ = event_tx.send(StreamEvent::State(ConnectionState::Open));
            let _ = event_tx.send(StreamEvent::Connected);
            None
        }
        Ok(StreamMessage::Progress(snapshot)) => {
            let snapshot = snapshot.normalized();
            tracing::debug!(
                job_id,
                stage = snapshot.stage.label(),
                overall = snapshot.overall_progress,
                "Job progress",
            );
            *last_snapshot = Some(snapshot.clone());
            let _ = event_tx.send(StreamEvent::Progress(snapshot));
            None
        }
        Ok(StreamMessage::Done(data)) => {
            tracing::info!(job_id, status = ?data.status, "Job reached terminal state");
            let event = if data.status == JobStatus::Completed {
                StreamEvent::Completed {
                    last: last_snapshot.clone(),
                }
            } else {
                StreamEvent::Terminated {
                    status: data.status,
                }
            };
            let _ = event_tx.send(event);
            Some(ProcessorExit::Done)
        }
        Ok(StreamMessage::Error(data)) => {
            // The server closes the channel after a named error; the
            // ensuing transport exit drives reconnection, so no local
            // close is issued here.
            tracing::warn!(job_id, message = %data.message, "In-band job stream error");
            let _ = event_tx.send(StreamEvent::JobError {
                message: data.message,
            });
            None
        }
        Err(e) => {
            tracing::warn!(
                job_id,
                error = %e,
                raw_message = %text,
                "Failed to parse job stream message",
            );
            None
        }
    }
}
