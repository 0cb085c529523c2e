pub mod analyser;
pub mod backend;
pub mod file;
pub mod scripted;

#[cfg(feature = "microphone")]
pub mod microphone;

pub use analyser::{SampleSource, SampleWindow, SpectrumAnalyser};
pub use backend::{
    AcquireError, Analyser, AudioProvider, AudioProviderFactory, AudioSource, CaptureConstraints,
    InputStream,
};
pub use file::{WavFileProvider, WavRecording};
pub use scripted::ScriptedProvider;

#[cfg(feature = "microphone")]
pub use microphone::MicrophoneProvider;
