//! Sleep session model and lifecycle
//!
//! This module provides:
//! - `Reading` and `Session`, the persisted data model
//! - `reduce`, which derives average, peak, spikes and quality band
//! - `SleepTracker`, which opens a session on start and closes and stores it on stop
//! - Display helpers for durations and times

mod format;
mod session;
mod stats;
mod tracker;

pub use format::{format_duration, format_elapsed, format_night, format_time_of_day};
pub use session::{Reading, Session, SessionError, SessionSummary};
pub use stats::{
    reduce, QualityBand, SessionStats, MODERATE_THRESHOLD, NOISY_THRESHOLD, SPIKE_THRESHOLD,
};
pub use tracker::{SleepTracker, TrackerError, TrackingStatus};
