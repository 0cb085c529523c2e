use std::time::Duration;

use super::sampler::SamplerError;
use crate::audio::analyser::{MAX_FFT_SIZE, MIN_FFT_SIZE};
use crate::audio::CaptureConstraints;

/// Sampling interval used by the tracker
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(2000);

/// Analyser window, in samples
pub const DEFAULT_FFT_SIZE: usize = 256;

/// Configuration for a sampler
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Time between two readings
    pub interval: Duration,

    /// FFT window of the frequency analyser (power of two)
    pub fft_size: usize,

    /// Host processing requested when opening the input.
    /// Default: everything off
    pub constraints: CaptureConstraints,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            fft_size: DEFAULT_FFT_SIZE,
            constraints: CaptureConstraints::raw(),
        }
    }
}

impl SamplerConfig {
    /// Reject settings the sampling loop cannot run with
    pub fn validate(&self) -> Result<(), SamplerError> {
        if self.interval.is_zero() {
            return Err(SamplerError::InvalidConfig(
                "interval must be greater than zero".to_string(),
            ));
        }

        if !self.fft_size.is_power_of_two() || !(MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&self.fft_size) {
            return Err(SamplerError::InvalidConfig(format!(
                "fft size must be a power of two in {MIN_FFT_SIZE}..={MAX_FFT_SIZE}, got {}",
                self.fft_size
            )));
        }

        Ok(())
    }
}
