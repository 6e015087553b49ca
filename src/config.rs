//! Application-level configuration loading.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::machine::{clamp_rounds, clamp_time_sec};

/// Default location on disk where the JSON configuration is looked up.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "BLUFFROOM_CONFIG_PATH";

/// Default scheduler evaluation interval in milliseconds.
const DEFAULT_TICK_INTERVAL_MS: u64 = 250;
/// Default number of rounds when the creator does not pick one.
const DEFAULT_ROUNDS: u32 = 1;
/// Default asking-phase timer in seconds.
const DEFAULT_ASK_TIME_SEC: u32 = 30;
/// Default voting-phase timer in seconds.
const DEFAULT_VOTE_TIME_SEC: u32 = 20;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// How often each client re-evaluates the current phase deadline.
    pub tick_interval_ms: u64,
    /// Settings applied when the room creator leaves a field blank.
    pub room_defaults: RoomDefaults,
}

#[derive(Debug, Clone)]
/// Default room settings, pre-clamped into their allowed ranges.
pub struct RoomDefaults {
    /// Rounds per game.
    pub rounds: u32,
    /// Seconds granted to compose a question.
    pub ask_time_sec: u32,
    /// Seconds granted to vote.
    pub vote_time_sec: u32,
}

impl AppConfig {
    /// Load the configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(path = %path.display(), "loaded configuration");
                    config
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
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            room_defaults: RoomDefaults {
                rounds: DEFAULT_ROUNDS,
                ask_time_sec: DEFAULT_ASK_TIME_SEC,
                vote_time_sec: DEFAULT_VOTE_TIME_SEC,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file.
struct RawConfig {
    tick_interval_ms: Option<u64>,
    rounds: Option<u32>,
    ask_time_sec: Option<u32>,
    vote_time_sec: Option<u32>,
}

impl From<RawConfig> for AppConfig {
    fn from(raw: RawConfig) -> Self {
        let base = Self::default();
        Self {
            tick_interval_ms: raw.tick_interval_ms.unwrap_or(base.tick_interval_ms),
            room_defaults: RoomDefaults {
                rounds: clamp_rounds(raw.rounds.unwrap_or(base.room_defaults.rounds)),
                ask_time_sec: clamp_time_sec(
                    raw.ask_time_sec.unwrap_or(base.room_defaults.ask_time_sec),
                ),
                vote_time_sec: clamp_time_sec(
                    raw.vote_time_sec.unwrap_or(base.room_defaults.vote_time_sec),
                ),
            },
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
