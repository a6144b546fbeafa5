use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Settings key holding the capture duration in whole seconds
pub const KEY_AUDIO_DURATION: &str = "audio_duration";

/// Duration used when the settings store has no value
pub const DEFAULT_AUDIO_DURATION: &str = "30";

/// Default port for the sensor event listener
pub const DEFAULT_PORT: u16 = 9673;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub recording: RecordingConfig,
    /// Free-form string settings, looked up through [`SettingsStore`]
    #[serde(default)]
    pub settings: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordingConfig {
    /// Scratch file receiving raw PCM while a session is active
    pub temp_file: PathBuf,
    /// Directory finalized WAV files are written to
    pub output_dir: PathBuf,
    /// Session log (CSV)
    pub log_file: PathBuf,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Config {
    /// Load `path` (any format the `config` crate recognises, extension optional)
    /// with `SENSOR_COLLECTOR__SECTION__KEY` environment overrides.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("SENSOR_COLLECTOR").separator("__"))
            .build()
            .with_context(|| format!("Failed to read config from {}", path))?;

        settings
            .try_deserialize()
            .context("Failed to parse collector config")
    }

    /// Load `path` if it exists, otherwise fall back to [`Config::default`].
    pub fn load_or_default(path: &str) -> Result<Self> {
        let candidates = [path.to_string(), format!("{}.toml", path)];
        if candidates.iter().any(|p| std::path::Path::new(p).exists()) {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = PathBuf::from("data");
        let mut settings = HashMap::new();
        settings.insert(KEY_AUDIO_DURATION.to_string(), DEFAULT_AUDIO_DURATION.to_string());

        Self {
            service: ServiceConfig {
                name: "sensor-collector".to_string(),
                http: HttpConfig {
                    bind: "0.0.0.0".to_string(),
                    port: DEFAULT_PORT,
                },
            },
            recording: RecordingConfig {
                temp_file: data_dir.join("recording.raw"),
                output_dir: data_dir.join("audio"),
                log_file: data_dir.join("AudioRecordLog.csv"),
            },
            settings,
        }
    }
}

/// Read-only key/value settings, e.g. the host application's preferences.
pub trait SettingsStore: Send + Sync {
    fn get_string(&self, key: &str) -> Option<String>;

    fn get_string_or(&self, key: &str, default: &str) -> String {
        self.get_string(key).unwrap_or_else(|| default.to_string())
    }
}

impl SettingsStore for HashMap<String, String> {
    fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl SettingsStore for Config {
    fn get_string(&self, key: &str) -> Option<String> {
        self.settings.get_string(key)
    }
}
