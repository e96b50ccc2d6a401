use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pulse_stream::subscriber::{JobSubscriber, SubscriberConfig};
use pulse_watch::config::WatchConfig;
use pulse_watch::tracker::JobTracker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pulse_watch=info,pulse_stream=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let job_id = std::env::args()
        .nth(1)
        .context("usage: pulse-watch <job_id>")?;
    let config = WatchConfig::from_env();

    tracing::info!(job_id = %job_id, ws_url = %config.ws_url, "Watching job");

    let subscriber = JobSubscriber::new(SubscriberConfig::new(config.ws_url.clone()));
    let mut subscription = subscriber.subscribe(job_id.clone()).await;
    let mut tracker = JobTracker::new(job_id);

    let mut interval = tokio::time::interval(Duration::from_millis(config.tick_interval_ms));
    let mut last_tick = tokio::time::Instant::now();
    let mut stream_ended = false;

    loop {
        tokio::select! {
            event = subscription.next_event(), if !stream_ended => {
                match event {
                    Some(event) => tracker.apply_event(event),
                    None => stream_ended = true,
                }
            }
            _ = interval.tick() => {
                let now = tokio::time::Instant::now();
                tracker.tick(now - last_tick);
                last_tick = now;

                let report = tracker.report();
                tracing::info!(
                    overall = report.overall,
                    stage = report.stage,
                    stage_label = report.stage_label.unwrap_or("-"),
                    eta = report.eta_label.as_deref().unwrap_or("-"),
                    color = %report.color.to_hex(),
                    connected = report.connected,
                    error = report.error.as_deref().unwrap_or("-"),
                    "progress",
                );

                // Keep ticking after the stream ends until the display
                // finishes its easing, then exit.
                if stream_ended && tracker.settled() {
                    break;
                }
            }
        }
    }

    subscriber.shutdown().await;
    Ok(())
}
