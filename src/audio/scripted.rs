use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tracing::debug;

use super::backend::{AcquireError, Analyser, AudioProvider, CaptureConstraints, InputStream};

#[derive(Debug, Clone)]
enum Outcome {
    Granted(Arc<[u8]>),
    Denied,
    StreamError(String),
}

/// Resource accounting shared by a scripted provider and everything it hands out
#[derive(Debug, Default)]
struct Counters {
    streams_opened: AtomicUsize,
    streams_released: AtomicUsize,
    analysers_created: AtomicUsize,
    analysers_released: AtomicUsize,
}

/// Audio provider that plays back canned magnitude snapshots.
///
/// Each analyser read fills every bin with the next scripted value (0..=255),
/// repeating the last one once the script runs out. No script yields silence.
pub struct ScriptedProvider {
    outcome: Outcome,
    counters: Arc<Counters>,
    requested: Mutex<Vec<CaptureConstraints>>,
}

impl ScriptedProvider {
    /// Access granted; snapshots follow `magnitudes`
    pub fn granted(magnitudes: impl Into<Vec<u8>>) -> Self {
        Self::with_outcome(Outcome::Granted(magnitudes.into().into()))
    }

    /// Access refused by the user or host
    pub fn denied() -> Self {
        Self::with_outcome(Outcome::Denied)
    }

    /// Access allowed but the device fails to open
    pub fn stream_error(message: impl Into<String>) -> Self {
        Self::with_outcome(Outcome::StreamError(message.into()))
    }

    fn with_outcome(outcome: Outcome) -> Self {
        Self {
            outcome,
            counters: Arc::new(Counters::default()),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn streams_opened(&self) -> usize {
        self.counters.streams_opened.load(Ordering::SeqCst)
    }

    pub fn streams_released(&self) -> usize {
        self.counters.streams_released.load(Ordering::SeqCst)
    }

    /// Streams currently held open by someone
    pub fn open_streams(&self) -> usize {
        self.streams_opened() - self.streams_released()
    }

    pub fn analysers_created(&self) -> usize {
        self.counters.analysers_created.load(Ordering::SeqCst)
    }

    pub fn analysers_released(&self) -> usize {
        self.counters.analysers_released.load(Ordering::SeqCst)
    }

    /// Constraints passed to every `open_stream` call so far, in order
    pub fn requested_constraints(&self) -> Vec<CaptureConstraints> {
        self.requested.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait::async_trait]
impl AudioProvider for ScriptedProvider {
    async fn open_stream(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Box<dyn InputStream>, AcquireError> {
        self.requested
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(*constraints);

        match &self.outcome {
            Outcome::Granted(magnitudes) => {
                self.counters.streams_opened.fetch_add(1, Ordering::SeqCst);
                debug!("Scripted stream opened ({} snapshots)", magnitudes.len());
                Ok(Box::new(ScriptedStream {
                    magnitudes: Arc::clone(magnitudes),
                    counters: Arc::clone(&self.counters),
                }))
            }
            Outcome::Denied => Err(AcquireError::PermissionDenied),
            Outcome::StreamError(message) => Err(AcquireError::Stream(message.clone())),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

struct ScriptedStream {
    magnitudes: Arc<[u8]>,
    counters: Arc<Counters>,
}

impl InputStream for ScriptedStream {
    fn create_analyser(&mut self, fft_size: usize) -> Result<Box<dyn Analyser>, AcquireError> {
        self.counters.analysers_created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedAnalyser {
            magnitudes: Arc::clone(&self.magnitudes),
            next: 0,
            bins: fft_size / 2,
            counters: Arc::clone(&self.counters),
        }))
    }
}

impl Drop for ScriptedStream {
    fn drop(&mut self) {
        self.counters.streams_released.fetch_add(1, Ordering::SeqCst);
    }
}

struct ScriptedAnalyser {
    magnitudes: Arc<[u8]>,
    next: usize,
    bins: usize,
    counters: Arc<Counters>,
}

impl Analyser for ScriptedAnalyser {
    fn frequency_bin_count(&self) -> usize {
        self.bins
    }

    fn byte_frequency_data(&mut self, out: &mut [u8]) {
        let value = match self.magnitudes.len() {
            0 => 0,
            len => self.magnitudes[self.next.min(len - 1)],
        };
        self.next += 1;
        out.fill(value);
    }
}

impl Drop for ScriptedAnalyser {
    fn drop(&mut self) {
        self.counters.analysers_released.fetch_add(1, Ordering::SeqCst);
    }
}
