use std::fmt;

use serde::{Deserialize, Serialize};

use super::session::Reading;

/// A reading above this level counts as a spike
pub const SPIKE_THRESHOLD: u8 = 50;

/// Averages above this are at least moderate
pub const MODERATE_THRESHOLD: u8 = 30;

/// Averages above this are noisy
pub const NOISY_THRESHOLD: u8 = 50;

/// Coarse classification of a noise level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityBand {
    #[default]
    Quiet,
    Moderate,
    Noisy,
}

impl QualityBand {
    /// Band for a single level (a session average or a live reading)
    pub fn for_level(level: u8) -> Self {
        if level > NOISY_THRESHOLD {
            QualityBand::Noisy
        } else if level > MODERATE_THRESHOLD {
            QualityBand::Moderate
        } else {
            QualityBand::Quiet
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityBand::Quiet => "quiet",
            QualityBand::Moderate => "moderate",
            QualityBand::Noisy => "noisy",
        }
    }

    /// One-line verdict for a night in this band
    pub fn message(&self) -> &'static str {
        match self {
            QualityBand::Quiet => "Excellent sleep environment",
            QualityBand::Moderate => "Some noise disturbances detected",
            QualityBand::Noisy => "Significant noise during sleep",
        }
    }
}

impl fmt::Display for QualityBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate noise statistics of a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    /// Rounded mean level
    pub average_level: u8,

    /// Highest level
    pub peak_level: u8,

    /// Readings above `SPIKE_THRESHOLD`
    pub spike_count: u32,

    /// Band of the average level
    pub quality_band: QualityBand,
}

/// Reduce a reading sequence to session statistics.
///
/// Order does not matter. No readings gives all zeros and `Quiet`.
pub fn reduce(readings: &[Reading]) -> SessionStats {
    if readings.is_empty() {
        return SessionStats::default();
    }

    let sum: u64 = readings.iter().map(|r| u64::from(r.level)).sum();
    let average_level = (sum as f64 / readings.len() as f64).round() as u8;
    let peak_level = readings.iter().map(|r| r.level).max().unwrap_or(0);
    let spike_count = readings
        .iter()
        .filter(|r| r.level > SPIKE_THRESHOLD)
        .count() as u32;

    SessionStats {
        average_level,
        peak_level,
        spike_count,
        quality_band: QualityBand::for_level(average_level),
    }
}
