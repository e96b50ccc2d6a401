//! End-to-end subscription tests against an in-process WebSocket
//! server.

use std::time::Duration;

use assert_matches::assert_matches;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use pulse_core::snapshot::ConnectionState;
use pulse_stream::events::StreamEvent;
use pulse_stream::reconnect::ReconnectConfig;
use pulse_stream::subscriber::{JobSubscriber, JobSubscription, SubscriberConfig};

/// Bind an ephemeral listener and return it with its `ws://` URL.
async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    (listener, url)
}

/// Reconnect policy fast enough for tests.
fn fast_reconnect(max_attempts: u32) -> ReconnectConfig {
    ReconnectConfig {
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        max_attempts,
    }
}

fn text(s: &str) -> Message {
    Message::Text(s.to_string().into())
}

fn progress_frame(job_id: &str, stage: &str, stage_progress: f64, overall: f64) -> Message {
    let payload = serde_json::json!({
        "type": "progress",
        "data": {
            "job_id": job_id,
            "stage": stage,
            "stage_progress": stage_progress,
            "overall_progress": overall,
            "status": "running",
            "eta_secs": 60.0,
            "updated_at": "2025-11-04T12:00:00Z",
        },
    });
    text(&payload.to_string())
}

/// Receive the next event with a test-level deadline.
async fn recv(sub: &mut JobSubscription) -> Option<StreamEvent> {
    tokio::time::timeout(Duration::from_secs(5), sub.next_event())
        .await
        .expect("timed out waiting for stream event")
}

#[tokio::test]
async fn delivers_connected_progress_and_completion() {
    let (listener, url) = bind().await;
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(text(r#"{"type":"connected"}"#)).await.unwrap();
        ws.send(progress_frame("abc123", "rendering", 10.0, 40.0))
            .await
            .unwrap();
        ws.send(progress_frame("abc123", "rendering", 14.0, 42.0))
            .await
            .unwrap();
        ws.send(text(r#"{"type":"done","data":{"status":"completed"}}"#))
            .await
            .unwrap();
        let _ = ws.next().await;
    });

    let subscriber = JobSubscriber::new(SubscriberConfig::new(url));
    let mut sub = subscriber.subscribe("abc123").await;

    assert_matches!(
        recv(&mut sub).await,
        Some(StreamEvent::State(ConnectionState::Connecting))
    );
    assert_matches!(
        recv(&mut sub).await,
        Some(StreamEvent::State(ConnectionState::Open))
    );
    assert_matches!(recv(&mut sub).await, Some(StreamEvent::Connected));
    assert_matches!(
        recv(&mut sub).await,
        Some(StreamEvent::Progress(snap)) if snap.overall_progress == 40.0
    );
    assert_matches!(
        recv(&mut sub).await,
        Some(StreamEvent::Progress(snap)) if snap.overall_progress == 42.0
    );
    // Terminal completion carries the last known snapshot.
    assert_matches!(
        recv(&mut sub).await,
        Some(StreamEvent::Completed { last: Some(snap) }) if snap.overall_progress == 42.0
    );
    // The task ends after a terminal event.
    assert_matches!(recv(&mut sub).await, None);
}

#[tokio::test]
async fn malformed_frames_are_dropped_without_closing_the_channel() {
    let (listener, url) = bind().await;
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(text(r#"{"type":"connected"}"#)).await.unwrap();
        ws.send(text("not json at all")).await.unwrap();
        ws.send(text(r#"{"type":"resumed","data":{}}"#)).await.unwrap();
        ws.send(progress_frame("abc123", "encoding", 5.0, 70.0))
            .await
            .unwrap();
        ws.send(text(r#"{"type":"done","data":{"status":"completed"}}"#))
            .await
            .unwrap();
        let _ = ws.next().await;
    });

    let subscriber = JobSubscriber::new(SubscriberConfig::new(url));
    let mut sub = subscriber.subscribe("abc123").await;

    assert_matches!(
        recv(&mut sub).await,
        Some(StreamEvent::State(ConnectionState::Connecting))
    );
    assert_matches!(
        recv(&mut sub).await,
        Some(StreamEvent::State(ConnectionState::Open))
    );
    assert_matches!(recv(&mut sub).await, Some(StreamEvent::Connected));
    // Both bad frames are skipped; the valid one still arrives.
    assert_matches!(
        recv(&mut sub).await,
        Some(StreamEvent::Progress(snap)) if snap.overall_progress == 70.0
    );
    assert_matches!(recv(&mut sub).await, Some(StreamEvent::Completed { .. }));
}

#[tokio::test]
async fn terminal_failed_status_is_surfaced_for_branching() {
    let (listener, url) = bind().await;
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(text(r#"{"type":"connected"}"#)).await.unwrap();
        ws.send(text(r#"{"type":"done","data":{"status":"failed"}}"#))
            .await
            .unwrap();
        let _ = ws.next().await;
    });

    let subscriber = JobSubscriber::new(SubscriberConfig::new(url));
    let mut sub = subscriber.subscribe("abc123").await;

    loop {
        match recv(&mut sub).await {
            Some(StreamEvent::Terminated { status }) => {
                assert_eq!(status, pulse_core::snapshot::JobStatus::Failed);
                break;
            }
            Some(_) => continue,
            None => panic!("subscription ended without a terminal event"),
        }
    }
}

#[tokio::test]
async fn in_band_error_is_surfaced_as_a_message() {
    let (listener, url) = bind().await;
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(text(r#"{"type":"connected"}"#)).await.unwrap();
        ws.send(text(r#"{"type":"error","data":{"message":"job not found"}}"#))
            .await
            .unwrap();
        // The server closes after a named error.
    });

    let config = SubscriberConfig {
        ws_url: url,
        reconnect: fast_reconnect(1),
    };
    let subscriber = JobSubscriber::new(config);
    let mut sub = subscriber.subscribe("missing").await;

    loop {
        match recv(&mut sub).await {
            Some(StreamEvent::JobError { message }) => {
                assert_eq!(message, "job not found");
                break;
            }
            Some(_) => continue,
            None => panic!("subscription ended without surfacing the error"),
        }
    }
    sub.unsubscribe();
}

#[tokio::test]
async fn reconnects_after_transport_drop() {
    let (listener, url) = bind().await;
    tokio::spawn(async move {
        // First connection: one progress update, then drop.
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(text(r#"{"type":"connected"}"#)).await.unwrap();
        ws.send(progress_frame("abc123", "rendering", 20.0, 40.0))
            .await
            .unwrap();
        drop(ws);

        // Second connection: resume and finish.
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(text(r#"{"type":"connected"}"#)).await.unwrap();
        ws.send(progress_frame("abc123", "encoding", 10.0, 55.0))
            .await
            .unwrap();
        ws.send(text(r#"{"type":"done","data":{"status":"completed"}}"#))
            .await
            .unwrap();
        let _ = ws.next().await;
    });

    let config = SubscriberConfig {
        ws_url: url,
        reconnect: fast_reconnect(5),
    };
    let subscriber = JobSubscriber::new(config);
    let mut sub = subscriber.subscribe("abc123").await;

    let mut saw_reconnecting = false;
    let mut reconnect_events = 0u32;
    loop {
        match recv(&mut sub).await {
            Some(StreamEvent::State(ConnectionState::Reconnecting { attempt })) => {
                saw_reconnecting = true;
                reconnect_events += 1;
                assert_eq!(attempt, 1);
            }
            Some(StreamEvent::Completed { last }) => {
                let last = last.expect("completion should carry the last snapshot");
                assert_eq!(last.overall_progress, 55.0);
                break;
            }
            Some(_) => continue,
            None => panic!("subscription ended before completing"),
        }
    }
    assert!(saw_reconnecting);
    assert_eq!(reconnect_events, 1);
}

#[tokio::test]
async fn retry_exhaustion_is_terminal_and_reported_once() {
    // Bind then drop, so every connect is refused.
    let (listener, url) = bind().await;
    drop(listener);

    let config = SubscriberConfig {
        ws_url: url,
        reconnect: fast_reconnect(2),
    };
    let subscriber = JobSubscriber::new(config);
    let mut sub = subscriber.subscribe("abc123").await;

    let mut events = Vec::new();
    while let Some(event) = recv(&mut sub).await {
        events.push(event);
    }

    let exhausted = events
        .iter()
        .filter(|e| matches!(e, StreamEvent::RetriesExhausted))
        .count();
    assert_eq!(exhausted, 1);

    let failed = events
        .iter()
        .filter(|e| matches!(e, StreamEvent::State(ConnectionState::Failed)))
        .count();
    assert_eq!(failed, 1);

    // Attempts are numbered 1..=2 and there is no third.
    let attempts: Vec<u32> = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::State(ConnectionState::Reconnecting { attempt }) => Some(*attempt),
            _ => None,
        })
        .collect();
    assert_eq!(attempts, vec![1, 2]);
}

#[tokio::test]
async fn unsubscribe_mid_connection_is_immediate_and_idempotent() {
    let (listener, url) = bind().await;
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(text(r#"{"type":"connected"}"#)).await.unwrap();
        // Hold the channel open; the client walks away first.
        let _ = ws.next().await;
    });

    let subscriber = JobSubscriber::new(SubscriberConfig::new(url));
    let mut sub = subscriber.subscribe("abc123").await;

    // Wait for the channel to be live before tearing it down.
    loop {
        match recv(&mut sub).await {
            Some(StreamEvent::Connected) => break,
            Some(_) => continue,
            None => panic!("subscription ended prematurely"),
        }
    }

    sub.unsubscribe();
    // Nothing can be observed after unsubscribe returns.
    assert_matches!(sub.next_event().await, None);

    // Safe to call again.
    sub.unsubscribe();
    assert_matches!(sub.next_event().await, None);
}

#[tokio::test]
async fn resubscribing_replaces_the_prior_channel() {
    let (listener, url) = bind().await;
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut ws = accept_async(stream).await.unwrap();
                let _ = ws.send(text(r#"{"type":"connected"}"#)).await;
                let _ = ws.next().await;
            });
        }
    });

    let subscriber = JobSubscriber::new(SubscriberConfig::new(url));
    let mut first = subscriber.subscribe("abc123").await;

    loop {
        match recv(&mut first).await {
            Some(StreamEvent::Connected) => break,
            Some(_) => continue,
            None => panic!("first subscription ended prematurely"),
        }
    }

    let mut second = subscriber.subscribe("abc123").await;

    // Only one live subscription per job id.
    assert_eq!(subscriber.active_jobs().await, vec!["abc123".to_string()]);

    // The first handle's stream ends once it is replaced.
    let ended = tokio::time::timeout(Duration::from_secs(5), async {
        while first.next_event().await.is_some() {}
    })
    .await;
    assert!(ended.is_ok());

    // The replacement channel is live.
    loop {
        match recv(&mut second).await {
            Some(StreamEvent::Connected) => break,
            Some(_) => continue,
            None => panic!("second subscription ended prematurely"),
        }
    }
}
