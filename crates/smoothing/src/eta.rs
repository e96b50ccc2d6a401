//! Exponential smoothing of the backend's completion estimate.
//!
//! Unlike progress, the ETA is volatile: it may rise as well as fall,
//! so there is no monotonicity constraint. A plain exponential moving
//! average keeps the displayed number from twitching on every
//! snapshot, with a snap threshold to avoid an infinite asymptotic
//! creep toward the actual value.

// ---------------------------------------------------------------------------
// Tuning defaults
// ---------------------------------------------------------------------------

/// Default smoothing factor. Deliberately gentler than the progress
/// gains: this value is allowed to regress while progress is not.
pub const DEFAULT_ALPHA: f64 = 0.15;
/// Residual difference below which the display snaps to the actual.
pub const DEFAULT_SNAP_THRESHOLD: f64 = 0.1;

/// Tunable parameters for ETA smoothing.
#[derive(Debug, Clone)]
pub struct EtaConfig {
    /// Exponential moving average factor in `(0, 1]`.
    pub alpha: f64,
    /// Snap distance in seconds.
    pub snap_threshold: f64,
}

impl Default for EtaConfig {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            snap_threshold: DEFAULT_SNAP_THRESHOLD,
        }
    }
}

// ---------------------------------------------------------------------------
// Smoother
// ---------------------------------------------------------------------------

/// Exponentially-smoothed view of the backend's ETA, in seconds.
#[derive(Debug, Clone, Default)]
pub struct EtaSmoother {
    config: EtaConfig,
    display_value: Option<f64>,
}

impl EtaSmoother {
    /// Create a smoother with the given tuning.
    pub fn new(config: EtaConfig) -> Self {
        Self {
            config,
            display_value: None,
        }
    }

    /// The currently displayed estimate, if any.
    pub fn display(&self) -> Option<f64> {
        self.display_value
    }

    /// Advance one frame toward the latest authoritative estimate.
    ///
    /// `None` means the backend has withdrawn its estimate; the display
    /// follows suit. The first observation seeds the display directly.
    pub fn tick(&mut self, actual: Option<f64>) {
        let Some(actual) = actual else {
            self.display_value = None;
            return;
        };

        match self.display_value {
            None => self.display_value = Some(actual),
            Some(current) => {
                let next = current + (actual - current) * self.config.alpha;
                self.display_value = if (actual - next).abs() < self.config.snap_threshold {
                    Some(actual)
                } else {
                    Some(next)
                };
            }
        }
    }

    /// Drop any held estimate (new job, subscription restart).
    pub fn reset(&mut self) {
        self.display_value = None;
    }
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

/// Render an ETA in seconds as a compact label: `"1h 02m"`, `"3m 05s"`,
/// or `"42s"`.
pub fn format_eta(secs: f64) -> String {
    let total = secs.max(0.0).round() as u64;
    if total >= 3600 {
        format!("{}h {:02}m", total / 3600, (total % 3600) / 60)
    } else if total >= 60 {
        format!("{}m {:02}s", total / 60, total % 60)
    } else {
        format!("{total}s")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_observation_seeds_display() {
        let mut eta = EtaSmoother::default();
        assert!(eta.display().is_none());
        eta.tick(Some(90.0));
        assert_eq!(eta.display(), Some(90.0));
    }

    #[test]
    fn converges_to_constant_actual_and_stays() {
        let mut eta = EtaSmoother::default();
        eta.tick(Some(100.0));
        for _ in 0..200 {
            eta.tick(Some(40.0));
        }
        assert_eq!(eta.display(), Some(40.0));

        eta.tick(Some(40.0));
        assert_eq!(eta.display(), Some(40.0));
    }

    #[test]
    fn moves_a_fraction_per_tick() {
        let mut eta = EtaSmoother::default();
        eta.tick(Some(100.0));
        eta.tick(Some(0.0));
        // One step of alpha=0.15 from 100 toward 0.
        assert!((eta.display().unwrap() - 85.0).abs() < 1e-9);
    }

    #[test]
    fn estimate_may_increase() {
        // No monotonicity constraint: a rising ETA is followed.
        let mut eta = EtaSmoother::default();
        eta.tick(Some(30.0));
        eta.tick(Some(120.0));
        let after = eta.display().unwrap();
        assert!(after > 30.0);
    }

    #[test]
    fn snaps_within_threshold() {
        let mut eta = EtaSmoother::default();
        eta.tick(Some(10.0));
        eta.tick(Some(10.05));
        assert_eq!(eta.display(), Some(10.05));
    }

    #[test]
    fn withdrawn_estimate_clears_display() {
        let mut eta = EtaSmoother::default();
        eta.tick(Some(30.0));
        eta.tick(None);
        assert!(eta.display().is_none());
    }

    #[test]
    fn reset_clears_display() {
        let mut eta = EtaSmoother::default();
        eta.tick(Some(30.0));
        eta.reset();
        assert!(eta.display().is_none());
    }

    // -- format_eta --

    #[test]
    fn formats_seconds() {
        assert_eq!(format_eta(42.0), "42s");
        assert_eq!(format_eta(0.0), "0s");
    }

    #[test]
    fn formats_minutes_with_padded_seconds() {
        assert_eq!(format_eta(185.0), "3m 05s");
        assert_eq!(format_eta(60.0), "1m 00s");
    }

    #[test]
    fn formats_hours_with_padded_minutes() {
        assert_eq!(format_eta(3720.0), "1h 02m");
    }

    #[test]
    fn negative_input_treated_as_zero() {
        assert_eq!(format_eta(-5.0), "0s");
    }
}
