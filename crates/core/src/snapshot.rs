//! Shared value types for job progress tracking.
//!
//! A [`ProgressSnapshot`] is one authoritative, point-in-time statement
//! of job progress from the backend. Snapshots are produced externally
//! and consumed read-only; the backend *intends* `overall_progress` to
//! be non-decreasing per job, but the wire protocol does not guarantee
//! it, so consumers defend against regressions instead of assuming
//! monotonicity.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{JobId, Timestamp};

/// Upper bound for progress percentages.
pub const PROGRESS_MAX: f64 = 100.0;

/// Clamp a progress percentage into the valid `[0, 100]` range.
pub fn clamp_percent(value: f64) -> f64 {
    value.clamp(0.0, PROGRESS_MAX)
}

// ---------------------------------------------------------------------------
// Pipeline stages
// ---------------------------------------------------------------------------

/// Fixed enumeration of the pipeline stages a job moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    Queued,
    Preparing,
    Rendering,
    Encoding,
    Finalizing,
}

impl JobStage {
    /// Human-readable label for display in the UI.
    pub fn label(self) -> &'static str {
        match self {
            Self::Queued => "Queued",
            Self::Preparing => "Preparing",
            Self::Rendering => "Rendering",
            Self::Encoding => "Encoding",
            Self::Finalizing => "Finalizing",
        }
    }
}

// ---------------------------------------------------------------------------
// Job status
// ---------------------------------------------------------------------------

/// Lifecycle status of a job as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Whether this status ends the job (no further snapshots expected).
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

// ---------------------------------------------------------------------------
// Connection state
// ---------------------------------------------------------------------------

/// State of the event-channel subscription for one job.
///
/// Created when a subscription starts, transitions on channel lifecycle
/// events, and is discarded on unsubscribe. The `attempt` carried by
/// [`ConnectionState::Reconnecting`] exists purely for display; the
/// retry policy keeps its own counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Initial channel setup is in flight.
    Connecting,
    /// The channel is established and delivering events.
    Open,
    /// The channel dropped; a reconnect attempt is pending or in flight.
    Reconnecting { attempt: u32 },
    /// The retry policy gave up; the subscription is dead.
    Failed,
}

impl ConnectionState {
    /// Whether the channel is currently delivering events.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Open)
    }
}

// ---------------------------------------------------------------------------
// Progress snapshot
// ---------------------------------------------------------------------------

/// One authoritative progress report for a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub job_id: JobId,
    pub stage: JobStage,
    /// Completion percentage of the current stage (0-100).
    pub stage_progress: f64,
    /// Completion percentage of the whole job (0-100).
    pub overall_progress: f64,
    pub status: JobStatus,
    /// Estimated seconds until completion, if the backend has one.
    #[serde(default)]
    pub eta_secs: Option<f64>,
    pub updated_at: Timestamp,
    /// Open string-keyed map for auxiliary detail (error text, node
    /// names, etc.).
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl ProgressSnapshot {
    /// Return the snapshot with percentages clamped to `[0, 100]` and
    /// any negative ETA dropped.
    ///
    /// Applied once at the parse boundary so downstream consumers can
    /// rely on the ranges.
    pub fn normalized(mut self) -> Self {
        self.stage_progress = clamp_percent(self.stage_progress);
        self.overall_progress = clamp_percent(self.overall_progress);
        if let Some(eta) = self.eta_secs {
            if !eta.is_finite() || eta < 0.0 {
                self.eta_secs = None;
            }
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
