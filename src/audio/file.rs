use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use hound::{SampleFormat, WavReader};
use tracing::info;

use super::analyser::{SampleSource, SpectrumAnalyser};
use super::backend::{AcquireError, Analyser, AudioProvider, CaptureConstraints, InputStream};

/// A decoded WAV recording, downmixed to mono f32
pub struct WavRecording {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<f32>,
}

impl WavRecording {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path).context("Failed to open WAV file")?;

        let spec = reader.spec();
        let interleaved: Vec<f32> = match spec.sample_format {
            SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<Result<Vec<_>, _>>()
                .context("Failed to read audio samples")?,
            SampleFormat::Int => {
                let full_scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|s| s as f32 / full_scale))
                    .collect::<Result<Vec<_>, _>>()
                    .context("Failed to read audio samples")?
            }
        };

        let channels = spec.channels.max(1);
        let samples: Vec<f32> = interleaved
            .chunks(channels as usize)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();

        let duration_seconds = samples.len() as f64 / spec.sample_rate as f64;

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} frames",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }
}

/// Replays a WAV recording as a live input.
///
/// The analysis window follows wall-clock time since the stream was opened;
/// past the end of the file the input is silent.
pub struct WavFileProvider {
    name: String,
    sample_rate: u32,
    samples: Arc<[f32]>,
}

impl WavFileProvider {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_recording(WavRecording::open(path)?))
    }

    pub fn from_recording(recording: WavRecording) -> Self {
        Self {
            name: format!("WAV file {}", recording.path),
            sample_rate: recording.sample_rate,
            samples: recording.samples.into(),
        }
    }
}

#[async_trait::async_trait]
impl AudioProvider for WavFileProvider {
    async fn open_stream(
        &self,
        _constraints: &CaptureConstraints,
    ) -> Result<Box<dyn InputStream>, AcquireError> {
        // A recording carries no host processing; constraints are moot
        Ok(Box::new(FileStream {
            cursor: FileCursor {
                samples: Arc::clone(&self.samples),
                sample_rate: self.sample_rate,
                opened_at: Instant::now(),
            },
        }))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

struct FileStream {
    cursor: FileCursor,
}

impl InputStream for FileStream {
    fn create_analyser(&mut self, fft_size: usize) -> Result<Box<dyn Analyser>, AcquireError> {
        Ok(Box::new(SpectrumAnalyser::new(self.cursor.clone(), fft_size)?))
    }
}

#[derive(Clone)]
struct FileCursor {
    samples: Arc<[f32]>,
    sample_rate: u32,
    opened_at: Instant,
}

impl SampleSource for FileCursor {
    fn latest(&mut self, out: &mut [f32]) {
        let position = (self.opened_at.elapsed().as_secs_f64() * self.sample_rate as f64) as usize;
        let available = self.samples.get(position..).unwrap_or(&[]);
        let n = available.len().min(out.len());
        out[..n].copy_from_slice(&available[..n]);
        out[n..].fill(0.0);
    }
}
