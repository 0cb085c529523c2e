use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::audio::{AudioSource, CaptureConstraints};
use crate::sampler::SamplerConfig;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    #[serde(default)]
    pub sampler: SamplerSettings,
    #[serde(default)]
    pub audio: AudioConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct SamplerSettings {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Microphone,
    File,
    Scripted,
}

#[derive(Debug, Default, Deserialize)]
pub struct AudioConfig {
    #[serde(default)]
    pub source: SourceKind,
    /// WAV file for `source = "file"`
    pub file_path: Option<String>,
    /// Magnitudes (0..=255) for `source = "scripted"`
    #[serde(default)]
    pub scripted_levels: Vec<u8>,
}

#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    pub path: String,
}

fn default_interval_ms() -> u64 {
    2000
}

fn default_fft_size() -> usize {
    256
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            fft_size: default_fft_size(),
        }
    }
}

impl Config {
    /// Load `path` (any extension the config crate knows), then apply
    /// `SLEEP_DECIBEL__SECTION__KEY` environment overrides
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(
                config::Environment::with_prefix("SLEEP_DECIBEL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to load config from {path}"))?;

        let cfg: Self = settings.try_deserialize()?;
        cfg.sampler_config()
            .validate()
            .with_context(|| format!("Invalid [sampler] section in {path}"))?;

        Ok(cfg)
    }

    pub fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig {
            interval: Duration::from_millis(self.sampler.interval_ms),
            fft_size: self.sampler.fft_size,
            constraints: CaptureConstraints::raw(),
        }
    }

    pub fn audio_source(&self) -> Result<AudioSource> {
        match self.audio.source {
            SourceKind::Microphone => Ok(AudioSource::Microphone),
            SourceKind::File => {
                let path = self
                    .audio
                    .file_path
                    .as_deref()
                    .context("audio.file_path is required when audio.source = \"file\"")?;
                Ok(AudioSource::File(expand_path(path)?))
            }
            SourceKind::Scripted => Ok(AudioSource::Scripted(self.audio.scripted_levels.clone())),
        }
    }

    /// Store location with `~` and `$VARS` expanded
    pub fn store_path(&self) -> Result<PathBuf> {
        expand_path(&self.store.path)
    }
}

pub fn expand_path(path: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(path).with_context(|| format!("Failed to expand {path}"))?;
    Ok(PathBuf::from(expanded.as_ref()))
}
