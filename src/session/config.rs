use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::{SettingsStore, DEFAULT_AUDIO_DURATION, KEY_AUDIO_DURATION};
use crate::error::{CollectorError, Result};

/// Capture length in sample (calibration) mode
pub const SAMPLE_MODE_DURATION: Duration = Duration::from_secs(300);

/// Parameters supplied by the host when it asks for a capture session.
///
/// Every field is optional so an incomplete request can be represented;
/// [`StartParams::validate`] decides whether a session may be created.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartParams {
    /// Scratch file for raw PCM while recording
    pub temp_file: Option<PathBuf>,
    /// Finalized WAV file
    pub output_file: Option<PathBuf>,
    /// CSV session log
    pub log_file: Option<PathBuf>,
    /// Whether an automatic trigger started this capture
    pub triggered: Option<bool>,
    /// Sample mode: fixed 5 minute capture, ignores the configured duration
    #[serde(default)]
    pub sample: bool,
}

impl StartParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_temp_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.temp_file = Some(path.into());
        self
    }

    pub fn with_output_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_file = Some(path.into());
        self
    }

    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    pub fn with_triggered(mut self, triggered: bool) -> Self {
        self.triggered = Some(triggered);
        self
    }

    pub fn with_sample(mut self, sample: bool) -> Self {
        self.sample = sample;
        self
    }

    /// Check that every required parameter is present.
    pub fn validate(self) -> Result<SessionParams> {
        Ok(SessionParams {
            temp_file: self
                .temp_file
                .ok_or(CollectorError::MissingParameter("temp_file"))?,
            output_file: self
                .output_file
                .ok_or(CollectorError::MissingParameter("output_file"))?,
            log_file: self
                .log_file
                .ok_or(CollectorError::MissingParameter("log_file"))?,
            triggered: self
                .triggered
                .ok_or(CollectorError::MissingParameter("triggered"))?,
            sample: self.sample,
        })
    }
}

/// Validated start parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParams {
    pub temp_file: PathBuf,
    pub output_file: PathBuf,
    pub log_file: PathBuf,
    pub triggered: bool,
    pub sample: bool,
}

impl SessionParams {
    /// File name recorded in the session log
    pub fn file_name(&self) -> String {
        self.output_file
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| self.output_file.display().to_string())
    }

    /// How long the capture runs before the timer stops it.
    pub fn duration(&self, settings: &dyn SettingsStore) -> Duration {
        if self.sample {
            return SAMPLE_MODE_DURATION;
        }
        configured_duration(settings)
    }
}

/// Duration from the settings store (whole seconds, default 30).
pub fn configured_duration(settings: &dyn SettingsStore) -> Duration {
    let raw = settings.get_string_or(KEY_AUDIO_DURATION, DEFAULT_AUDIO_DURATION);
    match raw.trim().parse::<u64>() {
        Ok(secs) => Duration::from_secs(secs),
        Err(e) => {
            warn!(
                "Invalid {} setting {:?} ({}), using {}s",
                KEY_AUDIO_DURATION, raw, e, DEFAULT_AUDIO_DURATION
            );
            Duration::from_secs(30)
        }
    }
}
