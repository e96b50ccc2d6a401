//! Translates subscription events into smoothed display state.
//!
//! [`JobTracker`] owns one [`ProgressSmoother`] each for overall and
//! stage progress plus an [`EtaSmoother`], routes [`StreamEvent`]s
//! into them, and assembles the [`ProgressReport`] handed to the
//! renderer every frame. Snapshot arrival and tick cadence are fully
//! decoupled; either may outpace the other.

use std::time::Duration;

use pulse_core::snapshot::{ConnectionState, JobStage, JobStatus};
use pulse_core::types::JobId;
use pulse_smoothing::color::{progress_color, Rgb};
use pulse_smoothing::eta::{format_eta, EtaSmoother};
use pulse_smoothing::progress::ProgressSmoother;
use pulse_stream::events::StreamEvent;

/// Error label shown when the retry policy gives up.
const CONNECT_FAILED_MESSAGE: &str = "failed to connect after multiple attempts";

/// The per-frame output handed to the renderer.
#[derive(Debug, Clone)]
pub struct ProgressReport {
    /// Smoothed overall completion percentage.
    pub overall: f64,
    /// Smoothed current-stage completion percentage.
    pub stage: f64,
    /// Label of the current pipeline stage, once known.
    pub stage_label: Option<&'static str>,
    /// Formatted ETA, when the backend has an estimate.
    pub eta_label: Option<String>,
    /// Progress color on the red-to-green ramp.
    pub color: Rgb,
    /// Whether the event channel is currently live.
    pub connected: bool,
    /// Last reported job status; the renderer branches on terminal
    /// values.
    pub status: JobStatus,
    /// User-facing error detail, if any.
    pub error: Option<String>,
}

/// Display-side state for one tracked job.
pub struct JobTracker {
    job_id: JobId,
    overall: ProgressSmoother,
    stage: ProgressSmoother,
    eta: EtaSmoother,
    current_stage: Option<JobStage>,
    connection: ConnectionState,
    status: JobStatus,
    /// Latest authoritative ETA; fed to the smoother each tick.
    latest_eta: Option<f64>,
    error: Option<String>,
}

impl JobTracker {
    /// Create a tracker for one job, starting from an empty display.
    pub fn new(job_id: impl Into<JobId>) -> Self {
        Self {
            job_id: job_id.into(),
            overall: ProgressSmoother::default(),
            stage: ProgressSmoother::default(),
            eta: EtaSmoother::default(),
            current_stage: None,
            connection: ConnectionState::Connecting,
            status: JobStatus::Running,
            latest_eta: None,
            error: None,
        }
    }

    /// The job this tracker displays.
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Route one subscription event into the display state.
    pub fn apply_event(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::State(state) => {
                self.connection = state;
            }

            StreamEvent::Connected => {
                // Channel handshake; connection state arrives separately.
            }

            StreamEvent::Progress(snapshot) => {
                // A new stage legitimately restarts its bar from zero;
                // the overall bar is unaffected.
                if self.current_stage != Some(snapshot.stage) {
                    self.stage.reset();
                    self.current_stage = Some(snapshot.stage);
                }
                self.overall.set_target(snapshot.overall_progress);
                self.stage.set_target(snapshot.stage_progress);
                self.latest_eta = snapshot.eta_secs;
                self.status = snapshot.status;
            }

            StreamEvent::Completed { last } => {
                self.status = JobStatus::Completed;
                if let Some(last) = last {
                    tracing::debug!(
                        job_id = %self.job_id,
                        final_progress = last.overall_progress,
                        "Job completed",
                    );
                }
                // The backend said completed; ease the bars to 100 even
                // if the final snapshot stopped short of it.
                self.overall.mark_complete();
                self.stage.mark_complete();
                self.latest_eta = None;
            }

            StreamEvent::Terminated { status } => {
                self.status = status;
                self.latest_eta = None;
            }

            StreamEvent::JobError { message } => {
                self.error = Some(message);
            }

            StreamEvent::RetriesExhausted => {
                self.error = Some(CONNECT_FAILED_MESSAGE.into());
            }
        }
    }

    /// Advance all smoothing engines by one display frame.
    pub fn tick(&mut self, dt: Duration) {
        self.overall.tick(dt);
        self.stage.tick(dt);
        self.eta.tick(self.latest_eta);
    }

    /// Whether the display has caught up with everything it was told.
    pub fn settled(&self) -> bool {
        self.overall.is_settled() && self.stage.is_settled()
    }

    /// Assemble the renderer-facing output for the current frame.
    pub fn report(&self) -> ProgressReport {
        ProgressReport {
            overall: self.overall.display(),
            stage: self.stage.display(),
            stage_label: self.current_stage.map(JobStage::label),
            eta_label: self.eta.display().map(format_eta),
            color: progress_color(self.overall.display()),
            connected: self.connection.is_live(),
            status: self.status,
            error: self.error.clone(),
        }
    }
}
