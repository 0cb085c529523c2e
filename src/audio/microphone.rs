// Default input device capture via cpal

use std::sync::mpsc;
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tokio::sync::oneshot;
use tracing::{debug, error, info};

use super::analyser::{SampleWindow, SpectrumAnalyser, MAX_FFT_SIZE};
use super::backend::{AcquireError, Analyser, AudioProvider, CaptureConstraints, InputStream};

/// Microphone backend
///
/// cpal streams are not `Send`, so each open stream lives on its own thread
/// and feeds a shared [`SampleWindow`]. cpal hands out the device input as-is,
/// which already satisfies [`CaptureConstraints::raw`].
pub struct MicrophoneProvider;

impl MicrophoneProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MicrophoneProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl AudioProvider for MicrophoneProvider {
    async fn open_stream(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Box<dyn InputStream>, AcquireError> {
        if *constraints != CaptureConstraints::raw() {
            debug!("cpal input has no host processing; ignoring {:?}", constraints);
        }

        let window = SampleWindow::new(MAX_FFT_SIZE);
        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let capture_window = window.clone();
        let worker = std::thread::Builder::new()
            .name("microphone-capture".to_string())
            .spawn(move || capture_thread(capture_window, ready_tx, stop_rx))
            .map_err(|e| AcquireError::Stream(format!("failed to spawn capture thread: {e}")))?;

        match ready_rx.await {
            Ok(Ok(())) => Ok(Box::new(MicrophoneStream {
                window,
                stop_tx: Some(stop_tx),
                worker: Some(worker),
            })),
            Ok(Err(e)) => {
                let _ = worker.join();
                Err(e)
            }
            Err(_) => {
                let _ = worker.join();
                Err(AcquireError::Stream("capture thread exited early".to_string()))
            }
        }
    }

    fn name(&self) -> &str {
        "cpal microphone"
    }
}

fn capture_thread(
    window: SampleWindow,
    ready_tx: oneshot::Sender<Result<(), AcquireError>>,
    stop_rx: mpsc::Receiver<()>,
) {
    let stream = match open_default_input(window) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    if ready_tx.send(Ok(())).is_err() {
        return;
    }

    // Park until the handle is dropped; a closed channel counts as stop too
    let _ = stop_rx.recv();
    drop(stream);
    info!("Microphone stream released");
}

fn open_default_input(window: SampleWindow) -> Result<cpal::Stream, AcquireError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| AcquireError::DeviceUnavailable("no default input device".to_string()))?;

    let supported = device
        .default_input_config()
        .map_err(|e| AcquireError::DeviceUnavailable(e.to_string()))?;
    let sample_format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();

    info!(
        "Opening {} ({}Hz, {} channels, {:?})",
        device.name().unwrap_or_else(|_| "input device".to_string()),
        config.sample_rate.0,
        config.channels,
        sample_format
    );

    let stream = match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, window),
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, window),
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, window),
        cpal::SampleFormat::I32 => build_stream::<i32>(&device, &config, window),
        other => {
            return Err(AcquireError::Stream(format!(
                "unsupported sample format {other:?}"
            )))
        }
    }
    .map_err(|e| AcquireError::Stream(e.to_string()))?;

    stream
        .play()
        .map_err(|e| AcquireError::Stream(e.to_string()))?;

    Ok(stream)
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    window: SampleWindow,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::Sample + cpal::SizedSample + Send + 'static,
    f32: cpal::FromSample<T>,
{
    let channels = config.channels.max(1) as usize;

    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            // Downmix to mono
            window.push_iter(data.chunks(channels).map(|frame| {
                frame
                    .iter()
                    .map(|&s| -> f32 { cpal::Sample::from_sample(s) })
                    .sum::<f32>()
                    / frame.len() as f32
            }));
        },
        |err| {
            error!("Microphone stream error: {err}");
        },
        None,
    )
}

struct MicrophoneStream {
    window: SampleWindow,
    stop_tx: Option<mpsc::Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl InputStream for MicrophoneStream {
    fn create_analyser(&mut self, fft_size: usize) -> Result<Box<dyn Analyser>, AcquireError> {
        Ok(Box::new(SpectrumAnalyser::new(self.window.clone(), fft_size)?))
    }
}

impl Drop for MicrophoneStream {
    fn drop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Microphone capture thread panicked");
            }
        }
    }
}
