//! Periodic noise-level sampling
//!
//! The `Sampler` owns one live audio capture at a time and turns it into a
//! bounded, timestamped series of readings:
//! - Permission probing and stream acquisition through an `AudioProvider`
//! - One RMS level (0..=100) every interval, published on a watch channel
//! - Hand-off of the accumulated readings to the caller at stop

mod config;
mod level;
mod sampler;

pub use config::SamplerConfig;
pub use level::{level_from_magnitudes, normalize_rms, MAX_LEVEL};
pub use sampler::{
    Permission, Sampler, SamplerError, SamplerState, PERMISSION_DENIED_MESSAGE,
    RECORDING_LOST_MESSAGE, START_FAILED_MESSAGE,
};
