use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use super::stats::{reduce, QualityBand, SessionStats};
use crate::sampler::MAX_LEVEL;

/// One timestamped noise sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,

    /// Relative noise level, 0..=100
    #[serde(alias = "decibel", deserialize_with = "deserialize_level")]
    pub level: u8,
}

impl Reading {
    pub fn new(timestamp: i64, level: u8) -> Self {
        Self { timestamp, level }
    }
}

/// Stored levels above the scale are pinned to `MAX_LEVEL`
fn deserialize_level<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    Ok(u8::deserialize(deserializer)?.min(MAX_LEVEL))
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session {0} is already closed")]
    AlreadyClosed(String),
}

/// A tracked night: open while sampling, closed once with its readings and stats.
///
/// Field aliases accept older records that use the `*Decibel` and
/// `noiseQuality` names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    id: String,
    start_time: i64,
    end_time: Option<i64>,
    #[serde(default)]
    readings: Vec<Reading>,
    #[serde(alias = "averageDecibel", deserialize_with = "deserialize_level")]
    average_level: u8,
    #[serde(alias = "peakDecibel", deserialize_with = "deserialize_level")]
    peak_level: u8,
    spike_count: u32,
    #[serde(alias = "noiseQuality")]
    quality_band: QualityBand,
}

impl Session {
    /// A session that just started: no readings, no end
    pub fn open(id: impl Into<String>, start_time: i64) -> Self {
        Self {
            id: id.into(),
            start_time,
            end_time: None,
            readings: Vec::new(),
            average_level: 0,
            peak_level: 0,
            spike_count: 0,
            quality_band: QualityBand::Quiet,
        }
    }

    /// Attach the final readings and derive stats. Only allowed once.
    pub fn close(&mut self, end_time: i64, readings: Vec<Reading>) -> Result<(), SessionError> {
        if self.end_time.is_some() {
            return Err(SessionError::AlreadyClosed(self.id.clone()));
        }

        let stats = reduce(&readings);

        self.end_time = Some(end_time);
        self.readings = readings;
        self.average_level = stats.average_level;
        self.peak_level = stats.peak_level;
        self.spike_count = stats.spike_count;
        self.quality_band = stats.quality_band;

        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn start_time(&self) -> i64 {
        self.start_time
    }

    pub fn end_time(&self) -> Option<i64> {
        self.end_time
    }

    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }

    pub fn average_level(&self) -> u8 {
        self.average_level
    }

    pub fn peak_level(&self) -> u8 {
        self.peak_level
    }

    pub fn spike_count(&self) -> u32 {
        self.spike_count
    }

    pub fn quality_band(&self) -> QualityBand {
        self.quality_band
    }

    /// Stored aggregates; meaningful only once closed
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            average_level: self.average_level,
            peak_level: self.peak_level,
            spike_count: self.spike_count,
            quality_band: self.quality_band,
        }
    }

    /// Tracked time, `None` while open
    pub fn duration_ms(&self) -> Option<i64> {
        self.end_time.map(|end| end - self.start_time)
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
            duration_ms: self.duration_ms(),
            average_level: self.average_level,
            peak_level: self.peak_level,
            spike_count: self.spike_count,
            quality_band: self.quality_band,
            reading_count: self.readings.len(),
        }
    }
}

/// A session without its readings, for history listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: String,
    pub start_time: i64,
    pub end_time: Option<i64>,
    pub duration_ms: Option<i64>,
    pub average_level: u8,
    pub peak_level: u8,
    pub spike_count: u32,
    pub quality_band: QualityBand,
    pub reading_count: usize,
}
