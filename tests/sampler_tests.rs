// Tests for the periodic sampler
//
// These tests drive the sampler against a scripted provider on a paused tokio
// clock, so every tick lands exactly on its interval.

use std::sync::Arc;
use std::time::Duration;

use sleep_decibel::sampler::{
    PERMISSION_DENIED_MESSAGE, RECORDING_LOST_MESSAGE, START_FAILED_MESSAGE,
};
use sleep_decibel::{
    AcquireError, Analyser, AudioProvider, CaptureConstraints, Clock, InputStream, Permission,
    Sampler, SamplerConfig, SamplerError, SamplerState, ScriptedProvider,
};
use tokio::time::{self, Instant};

const BASE_MILLIS: i64 = 1_700_000_000_000;

/// Epoch clock that follows tokio's (paused) time
struct TokioClock {
    origin: Instant,
}

impl TokioClock {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            origin: Instant::now(),
        })
    }
}

impl Clock for TokioClock {
    fn now_millis(&self) -> i64 {
        BASE_MILLIS + self.origin.elapsed().as_millis() as i64
    }
}

fn sampler_for(provider: &Arc<ScriptedProvider>) -> Sampler {
    sampler_with(provider, SamplerConfig::default())
}

fn sampler_with(provider: &Arc<ScriptedProvider>, config: SamplerConfig) -> Sampler {
    let provider: Arc<dyn AudioProvider> = provider.clone();
    Sampler::new(provider, TokioClock::new(), config)
}

/// Provider whose analyser panics on first read, killing the sampling task
struct FaultyProvider;

struct FaultyStream;

struct FaultyAnalyser;

impl Analyser for FaultyAnalyser {
    fn frequency_bin_count(&self) -> usize {
        128
    }

    fn byte_frequency_data(&mut self, _out: &mut [u8]) {
        panic!("input device vanished");
    }
}

impl InputStream for FaultyStream {
    fn create_analyser(&mut self, _fft_size: usize) -> Result<Box<dyn Analyser>, AcquireError> {
        Ok(Box::new(FaultyAnalyser))
    }
}

#[async_trait::async_trait]
impl AudioProvider for FaultyProvider {
    async fn open_stream(
        &self,
        _constraints: &CaptureConstraints,
    ) -> Result<Box<dyn InputStream>, AcquireError> {
        Ok(Box::new(FaultyStream))
    }

    fn name(&self) -> &str {
        "faulty"
    }
}

#[tokio::test(start_paused = true)]
async fn test_three_ticks_produce_three_readings() {
    let provider = Arc::new(ScriptedProvider::granted(vec![26, 153, 51]));
    let mut sampler = sampler_for(&provider);

    sampler.start().await.expect("start");
    assert_eq!(sampler.state(), SamplerState::Recording);

    time::sleep(Duration::from_millis(6_500)).await;
    let readings = sampler.stop().await.unwrap();

    let levels: Vec<u8> = readings.iter().map(|r| r.level).collect();
    assert_eq!(levels, vec![10, 60, 20]);

    let timestamps: Vec<i64> = readings.iter().map(|r| r.timestamp).collect();
    assert_eq!(
        timestamps,
        vec![BASE_MILLIS + 2_000, BASE_MILLIS + 4_000, BASE_MILLIS + 6_000],
        "first reading one interval after start"
    );

    assert_eq!(sampler.state(), SamplerState::Idle);
    assert_eq!(provider.open_streams(), 0);
    assert_eq!(provider.analysers_released(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_before_first_tick_is_empty() {
    let provider = Arc::new(ScriptedProvider::granted(vec![200]));
    let mut sampler = sampler_for(&provider);

    sampler.start().await.expect("start");
    time::sleep(Duration::from_millis(1_999)).await;

    assert!(sampler.stop().await.unwrap().is_empty());
    assert_eq!(provider.open_streams(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_stop_when_idle_is_noop() {
    let provider = Arc::new(ScriptedProvider::granted(vec![26]));
    let mut sampler = sampler_for(&provider);

    assert!(sampler.stop().await.unwrap().is_empty());
    assert_eq!(sampler.state(), SamplerState::Idle);
    assert_eq!(provider.streams_opened(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_stop_twice_releases_once() {
    let provider = Arc::new(ScriptedProvider::granted(vec![26]));
    let mut sampler = sampler_for(&provider);

    sampler.start().await.expect("start");
    time::sleep(Duration::from_millis(2_500)).await;

    assert_eq!(sampler.stop().await.unwrap().len(), 1);
    assert!(sampler.stop().await.unwrap().is_empty());

    assert_eq!(provider.streams_opened(), 1);
    assert_eq!(provider.streams_released(), 1);
    assert_eq!(provider.analysers_created(), 1);
    assert_eq!(provider.analysers_released(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_restart_starts_a_fresh_buffer() {
    let provider = Arc::new(ScriptedProvider::granted(vec![26]));
    let mut sampler = sampler_for(&provider);

    sampler.start().await.expect("first start");
    time::sleep(Duration::from_millis(4_500)).await;
    assert_eq!(sampler.stop().await.unwrap().len(), 2);

    sampler.start().await.expect("second start");
    time::sleep(Duration::from_millis(2_500)).await;
    assert_eq!(sampler.stop().await.unwrap().len(), 1);

    assert_eq!(provider.streams_opened(), 2);
    assert_eq!(provider.open_streams(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_start_while_recording_is_rejected() {
    let provider = Arc::new(ScriptedProvider::granted(vec![26]));
    let mut sampler = sampler_for(&provider);

    sampler.start().await.expect("start");
    assert_eq!(sampler.start().await, Err(SamplerError::AlreadyRecording));

    assert_eq!(sampler.state(), SamplerState::Recording);
    assert_eq!(provider.streams_opened(), 1, "no second stream");

    sampler.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_denied_start_stays_idle() {
    let provider = Arc::new(ScriptedProvider::denied());
    let mut sampler = sampler_for(&provider);

    assert_eq!(sampler.start().await, Err(SamplerError::PermissionDenied));

    assert_eq!(sampler.state(), SamplerState::Idle);
    assert!(!sampler.is_recording());
    assert_eq!(sampler.permission(), Permission::Denied);
    assert_eq!(sampler.error(), Some(PERMISSION_DENIED_MESSAGE));
    assert_eq!(provider.streams_opened(), 0);
    assert!(sampler.stop().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stream_failure_reports_start_failed() {
    let provider = Arc::new(ScriptedProvider::stream_error("device busy"));
    let mut sampler = sampler_for(&provider);

    let err = sampler.start().await.unwrap_err();
    assert!(matches!(err, SamplerError::Acquisition(ref msg) if msg.contains("device busy")));

    assert_eq!(sampler.state(), SamplerState::Idle);
    assert_eq!(sampler.error(), Some(START_FAILED_MESSAGE));
    assert_eq!(sampler.permission(), Permission::Unknown);
}

#[tokio::test(start_paused = true)]
async fn test_success_clears_previous_error() {
    let denied = Arc::new(ScriptedProvider::denied());
    let mut sampler = sampler_for(&denied);
    assert!(!sampler.request_access().await);
    assert_eq!(sampler.error(), Some(PERMISSION_DENIED_MESSAGE));

    let granted = Arc::new(ScriptedProvider::granted(vec![26]));
    let mut sampler = sampler_for(&granted);
    assert!(sampler.request_access().await);
    assert_eq!(sampler.error(), None);
    assert_eq!(sampler.permission(), Permission::Granted);
}

#[tokio::test(start_paused = true)]
async fn test_recording_requests_raw_input() {
    let provider = Arc::new(ScriptedProvider::granted(vec![26]));
    let mut sampler = sampler_for(&provider);

    sampler.start().await.expect("start");
    sampler.stop().await.unwrap();

    assert_eq!(provider.requested_constraints(), vec![CaptureConstraints::raw()]);
    let raw = CaptureConstraints::raw();
    assert!(!raw.echo_cancellation && !raw.noise_suppression && !raw.auto_gain_control);
}

#[tokio::test(start_paused = true)]
async fn test_request_access_keeps_nothing_open() {
    let provider = Arc::new(ScriptedProvider::granted(vec![26]));
    let mut sampler = sampler_for(&provider);

    assert!(sampler.request_access().await);

    assert_eq!(sampler.permission(), Permission::Granted);
    assert_eq!(sampler.state(), SamplerState::Idle);
    assert_eq!(provider.streams_opened(), 1);
    assert_eq!(provider.open_streams(), 0);
    assert_eq!(provider.analysers_created(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_current_level_follows_ticks() {
    let provider = Arc::new(ScriptedProvider::granted(vec![26, 153]));
    let mut sampler = sampler_for(&provider);
    let mut level_rx = sampler.subscribe_level();

    assert_eq!(sampler.current_level(), 0);

    sampler.start().await.expect("start");

    level_rx.changed().await.expect("first tick");
    assert_eq!(*level_rx.borrow_and_update(), 10);

    level_rx.changed().await.expect("second tick");
    assert_eq!(*level_rx.borrow_and_update(), 60);
    assert_eq!(sampler.current_level(), 60);

    sampler.stop().await.unwrap();
    assert_eq!(sampler.current_level(), 0, "level resets when idle");
}

#[tokio::test(start_paused = true)]
async fn test_drop_releases_input() {
    let provider = Arc::new(ScriptedProvider::granted(vec![26]));

    {
        let mut sampler = sampler_for(&provider);
        sampler.start().await.expect("start");
        time::sleep(Duration::from_millis(2_500)).await;
    }

    // Let the aborted task be torn down
    time::sleep(Duration::from_millis(10)).await;

    assert_eq!(provider.open_streams(), 0);
    assert_eq!(provider.analysers_released(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_discards_readings() {
    let provider = Arc::new(ScriptedProvider::granted(vec![26]));
    let mut sampler = sampler_for(&provider);

    sampler.start().await.expect("start");
    time::sleep(Duration::from_millis(4_500)).await;

    sampler.shutdown();
    time::sleep(Duration::from_millis(10)).await;

    assert_eq!(sampler.state(), SamplerState::Idle);
    assert_eq!(sampler.current_level(), 0);
    assert_eq!(provider.open_streams(), 0);
    assert!(sampler.stop().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_missed_ticks_are_not_replayed() {
    let provider = Arc::new(ScriptedProvider::granted(vec![26]));
    let mut sampler = sampler_for(&provider);

    sampler.start().await.expect("start");
    time::sleep(Duration::from_millis(1)).await;

    // Host suspended across ten intervals
    time::advance(Duration::from_secs(20)).await;
    time::sleep(Duration::from_millis(1)).await;

    assert_eq!(sampler.stop().await.unwrap().len(), 1, "one tick on resume, no burst");
}

#[tokio::test(start_paused = true)]
async fn test_zero_interval_is_rejected() {
    let provider = Arc::new(ScriptedProvider::granted(vec![26]));
    let config = SamplerConfig {
        interval: Duration::ZERO,
        ..Default::default()
    };
    let mut sampler = sampler_with(&provider, config);

    let err = sampler.start().await.unwrap_err();
    assert!(matches!(err, SamplerError::InvalidConfig(ref msg) if msg.contains("interval")));

    assert_eq!(sampler.state(), SamplerState::Idle);
    assert_eq!(sampler.error(), Some(START_FAILED_MESSAGE));
    assert_eq!(provider.streams_opened(), 0, "nothing opened for a bad config");
}

#[tokio::test(start_paused = true)]
async fn test_bad_fft_size_is_rejected() {
    let provider = Arc::new(ScriptedProvider::granted(vec![26]));

    for fft_size in [0, 16, 100, 65_536] {
        let config = SamplerConfig {
            fft_size,
            ..Default::default()
        };
        let mut sampler = sampler_with(&provider, config);

        assert!(
            matches!(sampler.start().await, Err(SamplerError::InvalidConfig(_))),
            "fft size {fft_size} accepted"
        );
        assert_eq!(sampler.state(), SamplerState::Idle);
    }

    assert_eq!(provider.streams_opened(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_dead_task_fails_stop() {
    let provider: Arc<dyn AudioProvider> = Arc::new(FaultyProvider);
    let mut sampler = Sampler::new(provider, TokioClock::new(), SamplerConfig::default());

    sampler.start().await.expect("start");
    time::sleep(Duration::from_millis(2_500)).await;

    let err = sampler.stop().await.unwrap_err();
    assert!(matches!(err, SamplerError::TaskFailed(_)));

    assert_eq!(sampler.state(), SamplerState::Idle);
    assert_eq!(sampler.current_level(), 0);
    assert_eq!(sampler.error(), Some(RECORDING_LOST_MESSAGE));

    // Nothing left to stop
    assert!(sampler.stop().await.unwrap().is_empty());
}
