//! Subscription lifecycle for job event channels.
//!
//! [`JobSubscriber`] spawns one long-lived task per tracked job
//! (connect -> process frames -> reconnect) and hands the caller a
//! [`JobSubscription`] to consume events from. Subscribing again to a
//! job id that already has a live channel closes the old channel
//! first; unsubscribing is synchronous and idempotent.

use std::collections::HashMap;

use tokio::sync::{mpsc, RwLock};
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;

use pulse_core::snapshot::ConnectionState;
use pulse_core::types::JobId;

use crate::client::StreamClient;
use crate::events::StreamEvent;
use crate::processor::{process_messages, ProcessorExit};
use crate::reconnect::{reconnect_loop, ReconnectConfig, ReconnectOutcome};

/// Configuration for a subscriber.
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    /// WebSocket base URL of the backend, e.g. `ws://host:3000`.
    pub ws_url: String,
    /// Retry policy applied on transport failures.
    pub reconnect: ReconnectConfig,
}

impl SubscriberConfig {
    /// Config with the default retry policy.
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// Internal bookkeeping for one live subscription task.
struct ActiveSubscription {
    /// Per-subscription cancellation token (child of the master token).
    cancel: CancellationToken,
    task_handle: tokio::task::JoinHandle<()>,
}

/// Opens and tracks event-channel subscriptions, one task per job.
///
/// Concurrent subscriptions to different job ids are fully isolated:
/// each task exclusively owns its socket, retry timers, and event
/// sender.
pub struct JobSubscriber {
    config: SubscriberConfig,
    /// Live subscription tasks indexed by job id.
    active: RwLock<HashMap<JobId, ActiveSubscription>>,
    /// Master cancellation token -- cancelled during shutdown.
    cancel: CancellationToken,
}

impl JobSubscriber {
    /// Create a subscriber for the backend at `config.ws_url`.
    pub fn new(config: SubscriberConfig) -> Self {
        Self {
            config,
            active: RwLock::new(HashMap::new()),
            cancel: CancellationToken::new(),
        }
    }

    /// Open a subscription to one job's event channel.
    ///
    /// If a subscription for this job id is already live, its channel
    /// is closed before the new one is opened.
    pub async fn subscribe(&self, job_id: impl Into<JobId>) -> JobSubscription {
        let job_id: JobId = job_id.into();

        if let Some(prev) = self.active.write().await.remove(&job_id) {
            tracing::info!(job_id = %job_id, "Closing prior subscription for job");
            prev.cancel.cancel();
            prev.task_handle.abort();
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let sub_cancel = self.cancel.child_token();
        let client = StreamClient::new(self.config.ws_url.clone(), job_id.clone());
        let reconnect = self.config.reconnect.clone();
        let cancel_clone = sub_cancel.clone();

        let task_handle = tokio::spawn(async move {
            run_subscription(client, reconnect, event_tx, cancel_clone).await;
        });
        let abort = task_handle.abort_handle();

        self.active.write().await.insert(
            job_id.clone(),
            ActiveSubscription {
                cancel: sub_cancel.clone(),
                task_handle,
            },
        );

        JobSubscription {
            job_id,
            events: event_rx,
            cancel: sub_cancel,
            abort,
        }
    }

    /// Ids of jobs with a live subscription task.
    pub async fn active_jobs(&self) -> Vec<JobId> {
        self.active.read().await.keys().cloned().collect()
    }

    /// Gracefully shut down all subscription tasks.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down job subscriber");
        self.cancel.cancel();

        let mut active = self.active.write().await;
        for (job_id, sub) in active.drain() {
            tracing::info!(job_id = %job_id, "Stopping subscription task");
            sub.cancel.cancel();
            let _ =
                tokio::time::timeout(std::time::Duration::from_secs(5), sub.task_handle).await;
        }
    }
}

/// Consumer handle for one job subscription.
///
/// Dropping the handle tears the subscription down the same way
/// [`unsubscribe`](Self::unsubscribe) does.
pub struct JobSubscription {
    job_id: JobId,
    events: mpsc::UnboundedReceiver<StreamEvent>,
    cancel: CancellationToken,
    abort: AbortHandle,
}

impl JobSubscription {
    /// The job this subscription tracks.
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Receive the next event, or `None` once the subscription is
    /// closed and drained.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    /// Synchronously close the channel and cancel any pending retry.
    ///
    /// Safe to call multiple times. After it returns, no event can be
    /// observed from this subscription: the task is cancelled and
    /// aborted, the receiver is closed, and anything already queued is
    /// discarded.
    pub fn unsubscribe(&mut self) {
        self.cancel.cancel();
        self.abort.abort();
        self.events.close();
        while self.events.try_recv().is_ok() {}
    }
}

impl Drop for JobSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.abort.abort();
    }
}

/// Core subscription loop: connect -> process frames -> reconnect.
///
/// Runs until the job ends, the retry budget is exhausted, or the
/// cancellation token triggers. Every reconnect episode starts with a
/// fresh attempt budget, so a successful reconnect resets the retry
/// counter by construction rather than by a consumer-visible side
/// effect.
async fn run_subscription(
    client: StreamClient,
    reconnect_config: ReconnectConfig,
    event_tx: mpsc::UnboundedSender<StreamEvent>,
    cancel: CancellationToken,
) {
    let mut last_snapshot = None;
    let _ = event_tx.send(StreamEvent::State(ConnectionState::Connecting));

    let mut conn = tokio::select! {
        _ = cancel.cancelled() => return,
        result = client.connect() => match result {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(
                    job_id = client.job_id(),
                    error = %e,
                    "Initial connect failed, entering reconnect loop",
                );
                match reconnect_loop(&client, &reconnect_config, &event_tx, &cancel).await {
                    ReconnectOutcome::Reconnected(conn) => conn,
                    ReconnectOutcome::Exhausted => {
                        give_up(&event_tx);
                        return;
                    }
                    ReconnectOutcome::Cancelled => return,
                }
            }
        }
    };

    loop {
        let exit = tokio::select! {
            _ = cancel.cancelled() => return,
            exit = process_messages(
                &mut conn.ws_stream,
                client.job_id(),
                &mut last_snapshot,
                &event_tx,
            ) => exit,
        };

        match exit {
            ProcessorExit::Done => return,
            ProcessorExit::Transport => {
                if cancel.is_cancelled() {
                    return;
                }
                tracing::info!(
                    job_id = client.job_id(),
                    "Connection lost, entering reconnect loop",
                );
                match reconnect_loop(&client, &reconnect_config, &event_tx, &cancel).await {
                    ReconnectOutcome::Reconnected(new_conn) => conn = new_conn,
                    ReconnectOutcome::Exhausted => {
                        give_up(&event_tx);
                        return;
                    }
                    ReconnectOutcome::Cancelled => return,
                }
            }
        }
    }
}

/// Surface the terminal connect failure, exactly once per subscription.
fn give_up(event_tx: &mpsc::UnboundedSender<StreamEvent>) {
    let _ = event_tx.send(StreamEvent::State(ConnectionState::Failed));
    let _ = event_tx.send(StreamEvent::RetriesExhausted);
}
