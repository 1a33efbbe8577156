//! Application-level configuration loading and storage backend selection.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "COURTSIDE_BACK_CONFIG_PATH";
/// Environment variable selecting the storage backend (`mongo` or `memory`).
const STORE_ENV: &str = "CLUB_STORE";
/// Environment variable pointing at a JSON seed for the memory backend.
const STORE_SEED_ENV: &str = "CLUB_STORE_SEED";

const DEFAULT_HOME_SIDE_NAME: &str = "Club";
const DEFAULT_OPPONENT_UNDO_STEP: i32 = 1;
const DEFAULT_SSE_CAPACITY: usize = 32;
const DEFAULT_PANEL_IDLE_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Display name of the club's own side in external tournaments and friendlies.
    pub home_side_name: String,
    /// Points removed from the opponent when its last basket is undone.
    pub opponent_undo_step: i32,
    /// Buffered events per panel SSE hub.
    pub sse_capacity: usize,
    /// How long a panel may go without SSE clients or requests before it is closed.
    pub panel_idle_timeout: Duration,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        home_side_name = %app_config.home_side_name,
                        opponent_undo_step = app_config.opponent_undo_step,
                        "loaded panel settings from config"
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
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            home_side_name: DEFAULT_HOME_SIDE_NAME.to_owned(),
            opponent_undo_step: DEFAULT_OPPONENT_UNDO_STEP,
            sse_capacity: DEFAULT_SSE_CAPACITY,
            panel_idle_timeout: Duration::from_secs(DEFAULT_PANEL_IDLE_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    home_side_name: Option<String>,
    #[serde(default)]
    opponent_undo_step: Option<i32>,
    #[serde(default)]
    sse_capacity: Option<usize>,
    #[serde(default)]
    panel_idle_timeout_secs: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = Self::default();
        Self {
            home_side_name: value
                .home_side_name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or(defaults.home_side_name),
            opponent_undo_step: value
                .opponent_undo_step
                .filter(|step| *step > 0)
                .unwrap_or(defaults.opponent_undo_step),
            // A broadcast channel needs room for at least one event.
            sse_capacity: value
                .sse_capacity
                .filter(|capacity| *capacity > 0)
                .unwrap_or(defaults.sse_capacity),
            panel_idle_timeout: value
                .panel_idle_timeout_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.panel_idle_timeout),
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

#[derive(Debug, Clone, PartialEq, Eq)]
/// Storage backend selected at startup.
pub enum StoreBackend {
    /// MongoDB configured through `MONGO_URI` / `MONGO_DB`.
    Mongo,
    /// In-process store, optionally seeded from a JSON file.
    Memory { seed: Option<PathBuf> },
}

impl StoreBackend {
    /// Read the backend choice from `CLUB_STORE`, defaulting to MongoDB.
    pub fn from_env() -> Self {
        let seed = env::var_os(STORE_SEED_ENV)
            .map(PathBuf::from)
            .filter(|path| !path.as_os_str().is_empty());
        Self::parse(env::var(STORE_ENV).ok().as_deref(), seed)
    }

    fn parse(value: Option<&str>, seed: Option<PathBuf>) -> Self {
        match value.map(str::trim) {
            Some(kind) if kind.eq_ignore_ascii_case("memory") => StoreBackend::Memory { seed },
            Some(kind) if kind.is_empty() || kind.eq_ignore_ascii_case("mongo") => {
                StoreBackend::Mongo
            }
            None => StoreBackend::Mongo,
            Some(other) => {
                warn!(backend = other, "unknown storage backend; using MongoDB");
                StoreBackend::Mongo
            }
        }
    }
}
