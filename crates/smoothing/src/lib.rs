//! Display-side smoothing algorithms for job progress.
//!
//! Authoritative snapshots arrive irregularly; these engines turn them
//! into a per-frame display that never shows unconfirmed progress,
//! never visually regresses, and converges cleanly to completion.
//! Everything here is pure state-plus-step-function logic with no I/O;
//! the caller drives ticks from its own redraw cadence.

pub mod color;
pub mod eta;
pub mod progress;
