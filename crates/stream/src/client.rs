//! WebSocket client for one job's event channel.
//!
//! [`StreamClient`] holds the connection configuration for a single
//! job subscription. Call [`StreamClient::connect`] to establish a
//! live [`StreamConnection`] over WebSocket.

use tokio_tungstenite::{connect_async, MaybeTlsStream};

use pulse_core::types::JobId;

/// The raw WebSocket stream type used throughout this crate.
pub type WsStream = tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Configuration handle for one job's event channel.
///
/// Stores the base WebSocket URL and the job id the channel is scoped
/// to. Create a [`StreamConnection`] by calling
/// [`connect`](Self::connect).
pub struct StreamClient {
    job_id: JobId,
    ws_url: String,
}

/// A live WebSocket connection to a job's event channel.
#[derive(Debug)]
pub struct StreamConnection {
    /// The job this channel is scoped to.
    pub job_id: JobId,
    /// Unique client ID sent during the WebSocket handshake.
    pub client_id: String,
    /// The raw WebSocket stream for reading frames.
    pub ws_stream: WsStream,
}

impl StreamClient {
    /// Create a new client for a job's event channel.
    ///
    /// * `ws_url` - WebSocket base URL, e.g. `ws://host:3000`.
    /// * `job_id` - backend-assigned job identifier.
    pub fn new(ws_url: String, job_id: JobId) -> Self {
        Self { job_id, ws_url }
    }

    /// The job id this client is scoped to.
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// WebSocket base URL (e.g. `ws://host:3000`).
    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Full endpoint URL for this job's event channel.
    ///
    /// The job id scopes the channel via a path segment; the client id
    /// rides along as a query parameter so the server can address
    /// frames to this specific subscriber.
    pub fn events_url(&self, client_id: &str) -> String {
        format!(
            "{}/jobs/{}/events?clientId={}",
            self.ws_url, self.job_id, client_id
        )
    }

    /// Connect to the job's event channel.
    ///
    /// Generates a unique client id (UUID v4) for the handshake. At
    /// most one connection exists per subscription; callers own the
    /// returned stream exclusively.
    pub async fn connect(&self) -> Result<StreamConnection, StreamClientError> {
        let client_id = uuid::Uuid::new_v4().to_string();
        let url = self.events_url(&client_id);

        let (ws_stream, _response) = connect_async(&url).await.map_err(|e| {
            StreamClientError::Connection(format!(
                "Failed to connect to job stream at {}: {e}",
                self.ws_url
            ))
        })?;

        tracing::info!(
            job_id = %self.job_id,
            client_id = %client_id,
            "Connected to job event channel at {}",
            self.ws_url,
        );

        Ok(StreamConnection {
            job_id: self.job_id.clone(),
            client_id,
            ws_stream,
        })
    }
}

/// Errors that can occur when establishing the event channel.
#[derive(Debug, thiserror::Error)]
pub enum StreamClientError {
    /// Failed to establish the WebSocket connection.
    #[error("Connection error: {0}")]
    Connection(String),
}
