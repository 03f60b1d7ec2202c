//! Application-level configuration loading for the quiz room engine.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "QUIZ_SCREEN_BACK_CONFIG_PATH";
/// Fallback answer window applied when a question carries no usable duration.
const DEFAULT_QUESTION_DURATION_SECS: u64 = 30;
/// Length of generated room codes.
const DEFAULT_ROOM_CODE_LENGTH: usize = 6;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    default_question_duration: u64,
    room_code_length: usize,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        default_question_duration = app_config.default_question_duration,
                        "loaded configuration from file"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Answer window in seconds used when a question specifies none.
    pub fn default_question_duration(&self) -> u64 {
        self.default_question_duration
    }

    /// Number of characters in generated room codes.
    pub fn room_code_length(&self) -> usize {
        self.room_code_length
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_question_duration: DEFAULT_QUESTION_DURATION_SECS,
            room_code_length: DEFAULT_ROOM_CODE_LENGTH,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    default_question_duration: Option<u64>,
    room_code_length: Option<usize>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = AppConfig::default();
        Self {
            default_question_duration: value
                .default_question_duration
                .filter(|secs| *secs > 0)
                .unwrap_or(defaults.default_question_duration),
            room_code_length: value
                .room_code_length
                .filter(|len| *len > 0)
                .unwrap_or(defaults.room_code_length),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
