//! Physics-based smoothing of a monotonic, bounded progress value.
//!
//! A [`ProgressSmoother`] tracks an externally supplied target in
//! `[0, 100]` with a damped-spring step while the job is running, then
//! switches to a fixed-duration cubic ease-out once the target reaches
//! 100 so the bar always lands on exactly 100 regardless of residual
//! velocity.
//!
//! Invariants, enforced every tick:
//! - the display never exceeds the target;
//! - the display never decreases while the target is below 100
//!   (a regressed target is ignored, not propagated — [`reset`] is the
//!   only sanctioned way down).
//!
//! [`reset`]: ProgressSmoother::reset

use std::time::Duration;

use pulse_core::snapshot::{clamp_percent, PROGRESS_MAX};

// ---------------------------------------------------------------------------
// Tuning defaults
// ---------------------------------------------------------------------------

/// Default spring acceleration gain per tick.
pub const DEFAULT_K_ACCEL: f64 = 0.025;
/// Default per-tick velocity damping factor (< 1).
pub const DEFAULT_K_DAMPING: f64 = 0.82;
/// Distance below which the display snaps to the target.
pub const DEFAULT_EPSILON: f64 = 0.05;
/// Duration of the completion ease-out to 100.
pub const DEFAULT_COMPLETION_DURATION: Duration = Duration::from_millis(500);
/// Cap on per-tick elapsed time, so a suspended host does not produce
/// one enormous jump on resume.
pub const DEFAULT_MAX_TICK_DELTA: Duration = Duration::from_millis(100);

/// Tunable parameters for the progress smoothing step.
#[derive(Debug, Clone)]
pub struct SmoothingConfig {
    /// Spring acceleration gain applied to the remaining distance.
    pub k_accel: f64,
    /// Velocity damping factor applied after acceleration (< 1).
    pub k_damping: f64,
    /// Snap distance: within this of the target, the display equals it.
    pub epsilon: f64,
    /// Length of the cubic ease-out once the target reaches 100.
    pub completion_duration: Duration,
    /// Upper bound on the elapsed time credited to a single tick.
    pub max_tick_delta: Duration,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            k_accel: DEFAULT_K_ACCEL,
            k_damping: DEFAULT_K_DAMPING,
            epsilon: DEFAULT_EPSILON,
            completion_duration: DEFAULT_COMPLETION_DURATION,
            max_tick_delta: DEFAULT_MAX_TICK_DELTA,
        }
    }
}

// ---------------------------------------------------------------------------
// Easing
// ---------------------------------------------------------------------------

/// Cubic ease-out: fast start, decelerating into the endpoint.
///
/// `t` is normalized time in `[0, 1]`; out-of-range input is clamped.
pub fn ease_out_cubic(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t).powi(3)
}

// ---------------------------------------------------------------------------
// Smoother
// ---------------------------------------------------------------------------

/// Completion ease-out in flight: from the value held when the target
/// reached 100, to exactly 100, over a fixed duration.
#[derive(Debug, Clone)]
struct CompletionEase {
    start_value: f64,
    elapsed: Duration,
}

/// Per-scalar smoothing state plus the step function that advances it.
///
/// One instance per animated value; created at subscription start with
/// a display of 0 and discarded when the tracked job changes.
#[derive(Debug, Clone)]
pub struct ProgressSmoother {
    config: SmoothingConfig,
    display_value: f64,
    velocity: f64,
    last_target: f64,
    completion: Option<CompletionEase>,
}

impl Default for ProgressSmoother {
    fn default() -> Self {
        Self::new(SmoothingConfig::default())
    }
}

impl ProgressSmoother {
    /// Create a smoother at display 0 with the given tuning.
    pub fn new(config: SmoothingConfig) -> Self {
        Self {
            config,
            display_value: 0.0,
            velocity: 0.0,
            last_target: 0.0,
            completion: None,
        }
    }

    /// The currently displayed value.
    pub fn display(&self) -> f64 {
        self.display_value
    }

    /// The authoritative target the display is tracking.
    pub fn target(&self) -> f64 {
        self.last_target
    }

    /// Whether the display has caught up with the target.
    pub fn is_settled(&self) -> bool {
        self.display_value == self.last_target
    }

    /// Supply a new authoritative target.
    ///
    /// The value is clamped to `[0, 100]`. A target below the current
    /// one (while below 100) is stale information, not a command to go
    /// backwards: it is ignored and logged at debug level. Once the
    /// target reaches 100 the completion ease-out starts and further
    /// targets are ignored.
    pub fn set_target(&mut self, target: f64) {
        if self.completion.is_some() {
            return;
        }

        let target = clamp_percent(target);
        if target < self.last_target {
            tracing::debug!(
                current = self.last_target,
                proposed = target,
                "Ignoring regressed progress target",
            );
            return;
        }

        self.last_target = target;
        if self.last_target >= PROGRESS_MAX {
            self.begin_completion();
        }
    }

    /// Force the target to 100 and start the completion ease-out.
    ///
    /// Used when the backend reports the job complete without having
    /// emitted a final 100% snapshot.
    pub fn mark_complete(&mut self) {
        if self.completion.is_some() {
            return;
        }
        self.last_target = PROGRESS_MAX;
        self.begin_completion();
    }

    /// Return to the initial state (display 0, no target).
    ///
    /// The only sanctioned decrease: a new job, or a stage restart.
    pub fn reset(&mut self) {
        self.display_value = 0.0;
        self.velocity = 0.0;
        self.last_target = 0.0;
        self.completion = None;
    }

    /// Advance one display frame.
    ///
    /// `dt` is the real time since the previous tick, capped at
    /// [`SmoothingConfig::max_tick_delta`]. Below the completion
    /// threshold the step is frame-based spring physics; during
    /// completion it is time-based easing.
    pub fn tick(&mut self, dt: Duration) {
        let dt = dt.min(self.config.max_tick_delta);

        if let Some(ease) = &mut self.completion {
            ease.elapsed += dt;
            let t = ease.elapsed.as_secs_f64() / self.config.completion_duration.as_secs_f64();
            if t >= 1.0 {
                self.display_value = PROGRESS_MAX;
            } else {
                self.display_value =
                    ease.start_value + (PROGRESS_MAX - ease.start_value) * ease_out_cubic(t);
            }
            return;
        }

        let distance = self.last_target - self.display_value;
        if distance <= self.config.epsilon {
            self.display_value = self.last_target;
            self.velocity = 0.0;
            return;
        }

        self.velocity = (self.velocity + distance * self.config.k_accel) * self.config.k_damping;
        let next = self.display_value + self.velocity;
        // One clamp enforces both invariants: never past the target,
        // never backwards.
        self.display_value = next.clamp(self.display_value, self.last_target);
    }

    fn begin_completion(&mut self) {
        self.velocity = 0.0;
        self.completion = Some(CompletionEase {
            start_value: self.display_value,
            elapsed: Duration::ZERO,
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
