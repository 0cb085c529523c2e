// Tests for configuration loading
//
// The shipped config file must parse, and overrides must land where the
// sampler and store look for them.

use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use sleep_decibel::config::{expand_path, SourceKind};
use sleep_decibel::{AudioSource, CaptureConstraints, Config};
use tempfile::tempdir;

/// Held by tests that set or depend on the fft size env override
static FFT_ENV: Mutex<()> = Mutex::new(());

fn shipped_config() -> String {
    format!("{}/config/sleep-decibel", env!("CARGO_MANIFEST_DIR"))
}

fn write_config(dir: &Path, body: &str) -> Result<String> {
    let path = dir.join("custom.toml");
    fs::write(&path, body)?;
    Ok(path.display().to_string())
}

#[test]
fn test_shipped_config_loads() -> Result<()> {
    let cfg = Config::load(&shipped_config())?;

    assert_eq!(cfg.service.name, "sleep-decibel");
    assert_eq!(cfg.service.http.bind, "127.0.0.1");
    assert_eq!(cfg.service.http.port, 8787);
    assert_eq!(cfg.sampler.interval_ms, 2000);
    assert_eq!(cfg.audio.source, SourceKind::Microphone);
    assert_eq!(cfg.audio_source()?, AudioSource::Microphone);

    Ok(())
}

#[test]
fn test_sampler_config_from_file() -> Result<()> {
    let cfg = Config::load(&shipped_config())?;
    let sampler = cfg.sampler_config();

    assert_eq!(sampler.interval, Duration::from_secs(2));
    assert_eq!(sampler.constraints, CaptureConstraints::raw());

    Ok(())
}

#[test]
fn test_env_overrides_file() -> Result<()> {
    let _guard = FFT_ENV.lock().unwrap_or_else(|e| e.into_inner());
    std::env::set_var("SLEEP_DECIBEL__SAMPLER__FFT_SIZE", "1024");
    let cfg = Config::load(&shipped_config());
    std::env::remove_var("SLEEP_DECIBEL__SAMPLER__FFT_SIZE");

    assert_eq!(cfg?.sampler_config().fft_size, 1024);

    Ok(())
}

#[test]
fn test_sampler_defaults_when_omitted() -> Result<()> {
    let dir = tempdir()?;
    let path = write_config(
        dir.path(),
        r#"
[service]
name = "test"

[service.http]
bind = "0.0.0.0"
port = 9000

[store]
path = "/tmp/sessions.json"
"#,
    )?;

    let cfg = Config::load(&path)?;
    assert_eq!(cfg.sampler.interval_ms, 2000);
    assert_eq!(cfg.audio.source, SourceKind::Microphone);
    assert_eq!(cfg.store_path()?, Path::new("/tmp/sessions.json"));

    Ok(())
}

#[test]
fn test_scripted_source() -> Result<()> {
    let dir = tempdir()?;
    let path = write_config(
        dir.path(),
        r#"
[service]
name = "test"

[service.http]
bind = "127.0.0.1"
port = 9001

[sampler]
interval_ms = 500
fft_size = 64

[audio]
source = "scripted"
scripted_levels = [26, 153]

[store]
path = "/tmp/sessions.json"
"#,
    )?;

    let cfg = Config::load(&path)?;
    assert_eq!(cfg.audio_source()?, AudioSource::Scripted(vec![26, 153]));
    assert_eq!(cfg.sampler_config().interval, Duration::from_millis(500));

    Ok(())
}

#[test]
fn test_file_source_needs_a_path() -> Result<()> {
    let dir = tempdir()?;
    let path = write_config(
        dir.path(),
        r#"
[service]
name = "test"

[service.http]
bind = "127.0.0.1"
port = 9002

[audio]
source = "file"

[store]
path = "/tmp/sessions.json"
"#,
    )?;

    let cfg = Config::load(&path)?;
    assert!(cfg.audio_source().is_err());

    Ok(())
}

fn sampler_section(interval_ms: u64, fft_size: usize) -> String {
    format!(
        r#"
[service]
name = "test"

[service.http]
bind = "127.0.0.1"
port = 9003

[sampler]
interval_ms = {interval_ms}
fft_size = {fft_size}

[store]
path = "/tmp/sessions.json"
"#
    )
}

#[test]
fn test_zero_interval_is_rejected() -> Result<()> {
    let dir = tempdir()?;
    let path = write_config(dir.path(), &sampler_section(0, 256))?;

    let err = Config::load(&path).unwrap_err();
    assert!(format!("{err:#}").contains("interval"), "got {err:#}");

    Ok(())
}

#[test]
fn test_bad_fft_size_is_rejected() -> Result<()> {
    let _guard = FFT_ENV.lock().unwrap_or_else(|e| e.into_inner());
    let dir = tempdir()?;

    for fft_size in [100, 16, 65_536] {
        let path = write_config(dir.path(), &sampler_section(2000, fft_size))?;
        assert!(Config::load(&path).is_err(), "fft size {fft_size} accepted");
    }

    let path = write_config(dir.path(), &sampler_section(2000, 512))?;
    assert_eq!(Config::load(&path)?.sampler_config().fft_size, 512);

    Ok(())
}

#[test]
fn test_missing_config_file() {
    assert!(Config::load("/nonexistent/sleep-decibel").is_err());
}

#[test]
fn test_expand_path() -> Result<()> {
    assert_eq!(expand_path("/var/lib/sessions.json")?, Path::new("/var/lib/sessions.json"));
    assert!(expand_path("$SLEEP_DECIBEL_TEST_UNSET_VAR/sessions.json").is_err());

    Ok(())
}
