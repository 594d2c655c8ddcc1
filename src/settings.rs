use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use crate::capture::FacingMode;
use crate::decoder::Symbology;
use crate::processor::FeedbackDurations;
use crate::sampler::{SamplerConfig, DEFAULT_BUFFER_HEIGHT, DEFAULT_BUFFER_WIDTH};

pub const MIN_SAMPLE_INTERVAL_MS: u64 = 100;
pub const MAX_SAMPLE_INTERVAL_MS: u64 = 1000;

const ENV_FRAMES_DIR: &str = "ROLLSCAN_FRAMES_DIR";
const ENV_SAMPLE_INTERVAL_MS: &str = "ROLLSCAN_SAMPLE_INTERVAL_MS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerSettings {
    pub sample_interval_ms: u64,
    pub buffer_width: u32,
    pub buffer_height: u32,
    pub symbology: Symbology,
    pub facing: FacingMode,
    pub beep_ms: u64,
    pub vibrate_ms: u64,
    pub tone_hz: f32,
    pub tone_gain: f32,
    /// Directory of still images played back as the camera feed.
    pub frames_dir: Option<PathBuf>,
    pub surface_width: u32,
    pub surface_height: u32,
    pub playing_timeout_ms: u64,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            sample_interval_ms: 200,
            buffer_width: DEFAULT_BUFFER_WIDTH,
            buffer_height: DEFAULT_BUFFER_HEIGHT,
            symbology: Symbology::Codabar,
            facing: FacingMode::Environment,
            beep_ms: 100,
            vibrate_ms: 100,
            tone_hz: 1000.0,
            tone_gain: 0.1,
            frames_dir: None,
            surface_width: 640,
            surface_height: 320,
            playing_timeout_ms: 5000,
        }
    }
}

impl ScannerSettings {
    /// Clamp out-of-range values instead of rejecting the whole file.
    fn normalized(mut self) -> Self {
        self.sample_interval_ms = self
            .sample_interval_ms
            .clamp(MIN_SAMPLE_INTERVAL_MS, MAX_SAMPLE_INTERVAL_MS);
        self.buffer_width = self.buffer_width.max(1);
        self.buffer_height = self.buffer_height.max(1);
        self.tone_gain = self.tone_gain.clamp(0.0, 1.0);
        self
    }

    fn apply_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = lookup(ENV_FRAMES_DIR).filter(|dir| !dir.is_empty()) {
            self.frames_dir = Some(PathBuf::from(dir));
        }
        if let Some(raw) = lookup(ENV_SAMPLE_INTERVAL_MS) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => self.sample_interval_ms = ms,
                Err(_) => warn!("Ignoring {ENV_SAMPLE_INTERVAL_MS}={raw:?}: not a number"),
            }
        }
        self
    }

    pub fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig {
            interval: Duration::from_millis(self.sample_interval_ms),
            buffer_width: self.buffer_width,
            buffer_height: self.buffer_height,
        }
    }

    pub fn feedback_durations(&self) -> FeedbackDurations {
        FeedbackDurations {
            beep_ms: self.beep_ms,
            vibrate_ms: self.vibrate_ms,
        }
    }

    pub fn playing_timeout(&self) -> Duration {
        Duration::from_millis(self.playing_timeout_ms)
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<ScannerSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        Self::with_env(path, |key| std::env::var(key).ok())
    }

    fn with_env(path: PathBuf, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let data = load(&path)?.apply_env(lookup).normalized();
        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn current(&self) -> ScannerSettings {
        self.read().clone()
    }

    pub fn update(&self, settings: ScannerSettings) -> Result<()> {
        let mut guard = self.write();
        *guard = settings.normalized();
        self.persist(&guard)
    }

    fn persist(&self, data: &ScannerSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, ScannerSettings> {
        match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, ScannerSettings> {
        match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn load(path: &Path) -> Result<ScannerSettings> {
    if !path.exists() {
        return Ok(ScannerSettings::default());
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings from {}", path.display()))?;
    Ok(serde_json::from_str(&contents).unwrap_or_else(|err| {
        warn!(
            "Malformed settings in {}, using defaults: {err}",
            path.display()
        );
        ScannerSettings::default()
    }))
}
