use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};

use super::backend::{AcquireError, Analyser};

/// Lower bound of the byte magnitude range, in dBFS
pub const MIN_DECIBELS: f32 = -100.0;
/// Upper bound of the byte magnitude range, in dBFS
pub const MAX_DECIBELS: f32 = -30.0;
/// Weight of the previous frame when smoothing magnitudes
pub const SMOOTHING_TIME_CONSTANT: f32 = 0.8;

pub const MIN_FFT_SIZE: usize = 32;
pub const MAX_FFT_SIZE: usize = 32768;

/// Supplies the most recent time-domain samples to an analyser
pub trait SampleSource: Send {
    /// Fill `out` with the latest `out.len()` mono samples
    fn latest(&mut self, out: &mut [f32]);
}

/// Rolling window of the most recent mono samples, shared between a capture
/// callback and an analyser.
#[derive(Clone)]
pub struct SampleWindow {
    samples: Arc<Mutex<VecDeque<f32>>>,
    capacity: usize,
}

impl SampleWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Append samples, evicting the oldest beyond capacity
    pub fn push_iter(&self, samples: impl IntoIterator<Item = f32>) {
        let mut window = self.samples.lock().unwrap_or_else(|e| e.into_inner());
        for sample in samples {
            if window.len() == self.capacity {
                window.pop_front();
            }
            window.push_back(sample);
        }
    }

    pub fn len(&self) -> usize {
        self.samples.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SampleSource for SampleWindow {
    fn latest(&mut self, out: &mut [f32]) {
        let window = self.samples.lock().unwrap_or_else(|e| e.into_inner());
        // Not enough history yet: left-pad with silence
        let missing = out.len().saturating_sub(window.len());
        out[..missing].fill(0.0);
        let skip = window.len().saturating_sub(out.len());
        for (slot, &sample) in out[missing..].iter_mut().zip(window.iter().skip(skip)) {
            *slot = sample;
        }
    }
}

/// Byte-scaled frequency analyser over a sample source.
///
/// Each read windows the latest `fft_size` samples (Blackman), runs a forward
/// real FFT, smooths magnitudes over time and maps them from
/// [`MIN_DECIBELS`, `MAX_DECIBELS`] onto `0..=255`. Only
/// `fft_size / 2` bins are reported; the Nyquist bin is dropped.
pub struct SpectrumAnalyser<S> {
    source: S,
    fft_size: usize,
    plan: Arc<dyn RealToComplex<f32>>,
    frame: Vec<f32>,
    input: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    window: Vec<f32>,
    smoothed: Vec<f32>,
}

impl<S: SampleSource> SpectrumAnalyser<S> {
    pub fn new(source: S, fft_size: usize) -> Result<Self, AcquireError> {
        if !fft_size.is_power_of_two() || !(MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&fft_size) {
            return Err(AcquireError::Stream(format!(
                "fft size must be a power of two in {MIN_FFT_SIZE}..={MAX_FFT_SIZE}, got {fft_size}"
            )));
        }

        let mut planner = RealFftPlanner::<f32>::new();
        let plan = planner.plan_fft_forward(fft_size);

        let input = plan.make_input_vec();
        let spectrum = plan.make_output_vec();
        let scratch = plan.make_scratch_vec();

        let window = blackman_window(fft_size);

        Ok(Self {
            source,
            fft_size,
            plan,
            frame: vec![0.0; fft_size],
            input,
            spectrum,
            scratch,
            window,
            smoothed: vec![0.0; fft_size / 2],
        })
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    fn update_smoothed(&mut self) {
        self.source.latest(&mut self.frame);

        for ((slot, &sample), &w) in self.input.iter_mut().zip(&self.frame).zip(&self.window) {
            *slot = sample * w;
        }

        if self
            .plan
            .process_with_scratch(&mut self.input, &mut self.spectrum, &mut self.scratch)
            .is_err()
        {
            // Buffers are sized by the plan; treat a mismatch as silence
            self.smoothed.fill(0.0);
            return;
        }

        let scale = 1.0 / self.fft_size as f32;
        for (smoothed, bin) in self.smoothed.iter_mut().zip(&self.spectrum) {
            let magnitude = bin.norm() * scale;
            *smoothed = SMOOTHING_TIME_CONSTANT * *smoothed
                + (1.0 - SMOOTHING_TIME_CONSTANT) * magnitude;
        }
    }
}

impl<S: SampleSource> Analyser for SpectrumAnalyser<S> {
    fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    fn byte_frequency_data(&mut self, out: &mut [u8]) {
        self.update_smoothed();

        for (byte, &magnitude) in out.iter_mut().zip(&self.smoothed) {
            *byte = magnitude_to_byte(magnitude);
        }
    }
}

fn blackman_window(size: usize) -> Vec<f32> {
    const A0: f32 = 0.42;
    const A1: f32 = 0.5;
    const A2: f32 = 0.08;

    (0..size)
        .map(|i| {
            let x = i as f32 / size as f32;
            A0 - A1 * (2.0 * std::f32::consts::PI * x).cos()
                + A2 * (4.0 * std::f32::consts::PI * x).cos()
        })
        .collect()
}

/// Map a linear magnitude onto the byte range via its dB value
pub fn magnitude_to_byte(magnitude: f32) -> u8 {
    let db = 20.0 * magnitude.log10();
    let scaled = ((db - MIN_DECIBELS) * 255.0 / (MAX_DECIBELS - MIN_DECIBELS)).floor();
    // -inf (silence) clamps to 0; NaN casts to 0
    scaled.clamp(0.0, 255.0) as u8
}
