use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::config::SamplerConfig;
use super::level::level_from_magnitudes;
use crate::audio::{AcquireError, Analyser, AudioProvider, InputStream};
use crate::clock::Clock;
use crate::session::Reading;

/// Shown when audio access is refused
pub const PERMISSION_DENIED_MESSAGE: &str = "Microphone permission denied";
/// Shown when the input stream cannot be opened
pub const START_FAILED_MESSAGE: &str = "Failed to start recording";
/// Shown when the sampling task dies mid-session
pub const RECORDING_LOST_MESSAGE: &str = "Recording stopped unexpectedly";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SamplerError {
    #[error("microphone permission denied")]
    PermissionDenied,

    #[error("failed to acquire audio input: {0}")]
    Acquisition(String),

    #[error("sampler is already recording")]
    AlreadyRecording,

    #[error("invalid sampler config: {0}")]
    InvalidConfig(String),

    #[error("sampling task failed: {0}")]
    TaskFailed(String),
}

impl From<AcquireError> for SamplerError {
    fn from(err: AcquireError) -> Self {
        match err {
            AcquireError::PermissionDenied => SamplerError::PermissionDenied,
            other => SamplerError::Acquisition(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplerState {
    Idle,
    /// Waiting on the provider for a stream
    Armed,
    Recording,
}

/// What we know about audio access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Unknown,
    Granted,
    Denied,
}

/// The running sampling task and the means to stop it
struct ActiveCapture {
    stop_tx: oneshot::Sender<()>,
    task: JoinHandle<Vec<Reading>>,
}

/// Periodic noise-level sampler over one audio provider
pub struct Sampler {
    provider: Arc<dyn AudioProvider>,
    clock: Arc<dyn Clock>,
    config: SamplerConfig,
    state: SamplerState,
    permission: Permission,
    error: Option<String>,
    level_tx: watch::Sender<u8>,
    capture: Option<ActiveCapture>,
}

impl Sampler {
    pub fn new(provider: Arc<dyn AudioProvider>, clock: Arc<dyn Clock>, config: SamplerConfig) -> Self {
        let (level_tx, _) = watch::channel(0);

        Self {
            provider,
            clock,
            config,
            state: SamplerState::Idle,
            permission: Permission::Unknown,
            error: None,
            level_tx,
            capture: None,
        }
    }

    /// Check audio access without keeping a stream open
    pub async fn request_access(&mut self) -> bool {
        info!("Requesting audio access from {}", self.provider.name());

        match self.provider.request_access().await {
            Ok(()) => {
                self.permission = Permission::Granted;
                self.error = None;
                info!("Audio access granted");
                true
            }
            Err(e) => {
                warn!("Audio access refused: {}", e);
                self.permission = Permission::Denied;
                self.error = Some(PERMISSION_DENIED_MESSAGE.to_string());
                false
            }
        }
    }

    /// Open the input and start sampling every `config.interval`
    pub async fn start(&mut self) -> Result<(), SamplerError> {
        if self.capture.is_some() {
            warn!("Sampler already recording");
            return Err(SamplerError::AlreadyRecording);
        }

        if let Err(e) = self.config.validate() {
            error!("Refusing to start sampler: {}", e);
            self.error = Some(START_FAILED_MESSAGE.to_string());
            return Err(e);
        }

        info!(
            "Starting sampler on {} (every {}ms, fft {})",
            self.provider.name(),
            self.config.interval.as_millis(),
            self.config.fft_size
        );

        self.state = SamplerState::Armed;

        let (stream, analyser) = match self.acquire().await {
            Ok(acquired) => acquired,
            Err(e) => {
                error!("Failed to start sampler: {}", e);
                self.state = SamplerState::Idle;
                self.error = Some(match e {
                    SamplerError::PermissionDenied => {
                        self.permission = Permission::Denied;
                        PERMISSION_DENIED_MESSAGE.to_string()
                    }
                    _ => START_FAILED_MESSAGE.to_string(),
                });
                return Err(e);
            }
        };

        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(sample_loop(
            stream,
            analyser,
            Arc::clone(&self.clock),
            self.level_tx.clone(),
            self.config.interval,
            stop_rx,
        ));

        self.capture = Some(ActiveCapture { stop_tx, task });
        self.state = SamplerState::Recording;
        self.permission = Permission::Granted;
        self.error = None;

        info!("Sampler recording");

        Ok(())
    }

    async fn acquire(&self) -> Result<(Box<dyn InputStream>, Box<dyn Analyser>), SamplerError> {
        let mut stream = self.provider.open_stream(&self.config.constraints).await?;
        // On failure `stream` drops here, releasing the device
        let analyser = stream.create_analyser(self.config.fft_size)?;
        Ok((stream, analyser))
    }

    /// Stop sampling and take every reading since `start()`.
    ///
    /// On an idle sampler this does nothing and returns an empty `Vec`. If the
    /// sampling task died, its readings are gone and this reports
    /// `TaskFailed`; the sampler is idle either way.
    pub async fn stop(&mut self) -> Result<Vec<Reading>, SamplerError> {
        let Some(capture) = self.capture.take() else {
            debug!("Sampler not recording");
            return Ok(Vec::new());
        };

        info!("Stopping sampler");

        // The task may already be gone if it panicked; the join below reports that
        let _ = capture.stop_tx.send(());

        let joined = capture.task.await;

        self.level_tx.send_replace(0);
        self.state = SamplerState::Idle;

        match joined {
            Ok(readings) => {
                info!("Sampler stopped ({} readings)", readings.len());
                Ok(readings)
            }
            Err(e) => {
                error!("Sampling task failed: {}", e);
                self.error = Some(RECORDING_LOST_MESSAGE.to_string());
                Err(SamplerError::TaskFailed(e.to_string()))
            }
        }
    }

    /// Cancel sampling and release the input, discarding readings
    pub fn shutdown(&mut self) {
        if let Some(capture) = self.capture.take() {
            info!("Shutting down sampler");
            capture.task.abort();
            self.level_tx.send_replace(0);
            self.state = SamplerState::Idle;
        }
    }

    /// Most recent level, 0 when idle
    pub fn current_level(&self) -> u8 {
        *self.level_tx.borrow()
    }

    /// Follow the live level
    pub fn subscribe_level(&self) -> watch::Receiver<u8> {
        self.level_tx.subscribe()
    }

    pub fn state(&self) -> SamplerState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == SamplerState::Recording
    }

    pub fn permission(&self) -> Permission {
        self.permission
    }

    /// Last user-facing failure, cleared by a successful access or start
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Sampling task body.
///
/// Owns the stream, the analyser and the reading buffer. Ticks run to
/// completion; stop is checked before each one. Aborting the task drops all
/// three.
async fn sample_loop(
    stream: Box<dyn InputStream>,
    mut analyser: Box<dyn Analyser>,
    clock: Arc<dyn Clock>,
    level_tx: watch::Sender<u8>,
    period: Duration,
    mut stop_rx: oneshot::Receiver<()>,
) -> Vec<Reading> {
    let mut bins = vec![0u8; analyser.frequency_bin_count()];
    let mut readings = Vec::new();

    // First reading one full period after start; after a host suspension,
    // resume on the next tick instead of bursting through the missed ones
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            // A dropped sender counts as stop too
            _ = &mut stop_rx => break,

            _ = ticker.tick() => {
                analyser.byte_frequency_data(&mut bins);
                let reading = Reading::new(clock.now_millis(), level_from_magnitudes(&bins));
                debug!("Reading {} at {}", reading.level, reading.timestamp);
                level_tx.send_replace(reading.level);
                readings.push(reading);
            }
        }
    }

    drop(analyser);
    drop(stream);

    readings
}
