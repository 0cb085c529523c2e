pub mod audio;
pub mod clock;
pub mod config;
pub mod http;
pub mod sampler;
pub mod session;
pub mod store;

pub use audio::{
    AcquireError, Analyser, AudioProvider, AudioProviderFactory, AudioSource, CaptureConstraints,
    InputStream, ScriptedProvider, WavFileProvider,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use http::{create_router, AppState};
pub use sampler::{Permission, Sampler, SamplerConfig, SamplerError, SamplerState};
pub use session::{
    reduce, QualityBand, Reading, Session, SessionStats, SessionSummary, SleepTracker,
    TrackerError, TrackingStatus,
};
pub use store::{SessionStore, StoreError};
