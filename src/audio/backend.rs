use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Processing the host may apply to the input before we see it.
///
/// Ambient measurement wants all of it off so the level reflects the room,
/// not a voice-tuned signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl CaptureConstraints {
    /// Unprocessed input, used while recording
    pub fn raw() -> Self {
        Self {
            echo_cancellation: false,
            noise_suppression: false,
            auto_gain_control: false,
        }
    }

    /// Whatever the host would hand out for a plain "audio: true" request
    pub fn host_default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self::raw()
    }
}

/// Failure to get at the audio input
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AcquireError {
    #[error("audio access denied")]
    PermissionDenied,

    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("audio stream error: {0}")]
    Stream(String),
}

/// Frequency-magnitude view over an open input stream
pub trait Analyser: Send {
    /// Number of magnitude bins (half the FFT size)
    fn frequency_bin_count(&self) -> usize;

    /// Copy the current byte magnitude snapshot (0..=255 per bin) into `out`.
    ///
    /// Writes at most `out.len()` bins.
    fn byte_frequency_data(&mut self, out: &mut [u8]);
}

/// An open, continuously running audio input.
///
/// Dropping the stream releases the underlying device tracks.
pub trait InputStream: Send {
    /// Attach a frequency analyser with an `fft_size`-sample window
    fn create_analyser(&mut self, fft_size: usize) -> Result<Box<dyn Analyser>, AcquireError>;
}

/// Host audio capability: permission and device access.
///
/// Implementations:
/// - Microphone: default input device via cpal (`microphone` feature)
/// - File: replay a WAV recording as if it were live input
/// - Scripted: canned magnitude snapshots, for tests
#[async_trait::async_trait]
pub trait AudioProvider: Send + Sync {
    /// Open a continuous input stream
    async fn open_stream(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Box<dyn InputStream>, AcquireError>;

    /// Ask for access without keeping anything open.
    ///
    /// The access stream is dropped before this returns.
    async fn request_access(&self) -> Result<(), AcquireError> {
        let stream = self.open_stream(&CaptureConstraints::host_default()).await?;
        drop(stream);
        Ok(())
    }

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Audio source type
#[derive(Debug, Clone, PartialEq)]
pub enum AudioSource {
    /// Default input device
    Microphone,
    /// WAV file replayed in real time
    File(PathBuf),
    /// Fixed sequence of uniform magnitude levels (0..=255)
    Scripted(Vec<u8>),
}

/// Audio provider factory
pub struct AudioProviderFactory;

impl AudioProviderFactory {
    /// Create a provider for the given source
    pub fn create(source: AudioSource) -> anyhow::Result<Arc<dyn AudioProvider>> {
        match source {
            AudioSource::Microphone => {
                #[cfg(feature = "microphone")]
                {
                    Ok(Arc::new(super::microphone::MicrophoneProvider::new()))
                }

                #[cfg(not(feature = "microphone"))]
                {
                    anyhow::bail!(
                        "Microphone capture is not compiled in; rebuild with --features microphone"
                    )
                }
            }

            AudioSource::File(path) => {
                let provider = super::file::WavFileProvider::open(&path)?;
                Ok(Arc::new(provider))
            }

            AudioSource::Scripted(levels) => {
                Ok(Arc::new(super::scripted::ScriptedProvider::granted(levels)))
            }
        }
    }
}
