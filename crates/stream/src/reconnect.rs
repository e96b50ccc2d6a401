//! Bounded exponential-backoff reconnection for the job event channel.
//!
//! When the channel drops from a transport failure, the subscription
//! loop calls [`reconnect_loop`] to retry with geometrically growing
//! delays, up to a capped delay and a bounded number of attempts.
//! In-band job errors never enter this path; only transport failures
//! are retried.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use pulse_core::snapshot::ConnectionState;

use crate::client::{StreamClient, StreamConnection};
use crate::events::StreamEvent;

/// Tunable parameters for the exponential-backoff strategy.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Base delay; attempt `n` waits `base_delay * 2^n`.
    pub base_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Attempts beyond this count are not made.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_attempts: 5,
        }
    }
}

/// Delay before reconnection attempt `attempt` (1-based).
///
/// `base_delay * 2^attempt`, clamped to [`ReconnectConfig::max_delay`].
pub fn retry_delay(attempt: u32, config: &ReconnectConfig) -> Duration {
    let cap = config.max_delay.as_secs_f64();
    let scaled = config.base_delay.as_secs_f64() * 2f64.powi(attempt.min(63) as i32);
    Duration::from_secs_f64(scaled.min(cap))
}

/// How a reconnect episode ended.
#[derive(Debug)]
pub enum ReconnectOutcome {
    /// A connection was re-established.
    Reconnected(StreamConnection),
    /// All attempts failed; the subscription is dead.
    Exhausted,
    /// The subscription was cancelled mid-episode.
    Cancelled,
}

/// Retry the connection with exponential backoff until one attempt
/// succeeds, the attempt budget is exhausted, or `cancel` triggers.
///
/// Each pending attempt is surfaced to consumers as
/// [`ConnectionState::Reconnecting`]. The attempt number carried there
/// is deliberately separate storage from the control counter that
/// decides whether to keep retrying: nothing downstream of a
/// successful reconnect can reset the storage this loop's decision
/// reads.
pub async fn reconnect_loop(
    client: &StreamClient,
    config: &ReconnectConfig,
    event_tx: &mpsc::UnboundedSender<StreamEvent>,
    cancel: &CancellationToken,
) -> ReconnectOutcome {
    // Control counter: read only by the retry decision below.
    let mut attempt = 0u32;
    // Display counter: surfaced to consumers, never read back here.
    let mut display_attempt = 0u32;

    loop {
        attempt += 1;
        if attempt > config.max_attempts {
            tracing::warn!(
                job_id = client.job_id(),
                attempts = config.max_attempts,
                "Giving up on job stream after repeated failures",
            );
            return ReconnectOutcome::Exhausted;
        }

        display_attempt += 1;
        let _ = event_tx.send(StreamEvent::State(ConnectionState::Reconnecting {
            attempt: display_attempt,
        }));

        let delay = retry_delay(attempt, config);
        tracing::info!(
            job_id = client.job_id(),
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Reconnecting to job stream",
        );

        tokio::select! {
            _ = cancel.cancelled() => return ReconnectOutcome::Cancelled,
            _ = tokio::time::sleep(delay) => {}
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(job_id = client.job_id(), "Reconnect cancelled");
                return ReconnectOutcome::Cancelled;
            }
            result = client.connect() => {
                match result {
                    Ok(conn) => return ReconnectOutcome::Reconnected(conn),
                    Err(e) => {
                        tracing::warn!(
                            job_id = client.job_id(),
                            error = %e,
                            "Reconnect attempt {attempt} failed",
                        );
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn delays_double_up_to_the_cap() {
        let config = ReconnectConfig::default();
        let expected_secs = [2, 4, 8, 10, 10];
        for (i, &secs) in expected_secs.iter().enumerate() {
            let attempt = (i + 1) as u32;
            assert_eq!(retry_delay(attempt, &config), Duration::from_secs(secs));
        }
    }

    #[test]
    fn delay_already_at_cap_stays_there() {
        let config = ReconnectConfig::default();
        assert_eq!(retry_delay(30, &config), Duration::from_secs(10));
    }

    #[test]
    fn custom_base_delay() {
        let config = ReconnectConfig {
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(60),
            ..Default::default()
        };
        assert_eq!(retry_delay(1, &config), Duration::from_millis(500));
        assert_eq!(retry_delay(3, &config), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn cancellation_token_stops_reconnect() {
        let cancel = CancellationToken::new();
        // Cancel up front: the loop should bail without connecting.
        cancel.cancel();

        let client = StreamClient::new("ws://localhost:9999".into(), "abc123".into());
        let (tx, _rx) = mpsc::unbounded_channel();

        let outcome = reconnect_loop(&client, &ReconnectConfig::default(), &tx, &cancel).await;
        assert_matches!(outcome, ReconnectOutcome::Cancelled);
    }

    #[tokio::test]
    async fn exhausts_after_max_attempts_against_dead_endpoint() {
        // Bind a listener to get a port, then drop it so connections
        // are refused immediately.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = StreamClient::new(format!("ws://{addr}"), "abc123".into());
        let config = ReconnectConfig {
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            max_attempts: 3,
        };
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let outcome = reconnect_loop(&client, &config, &tx, &cancel).await;
        assert_matches!(outcome, ReconnectOutcome::Exhausted);

        // One Reconnecting state per attempt, numbered 1..=3.
        for expected in 1..=3u32 {
            let event = rx.try_recv().unwrap();
            assert_matches!(
                event,
                StreamEvent::State(ConnectionState::Reconnecting { attempt }) if attempt == expected
            );
        }
        assert!(rx.try_recv().is_err());
    }
}
