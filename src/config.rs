//! Engine tuning loaded from an optional JSON file.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::{render::HitRadiusPolicy, state::ReferenceCanvas};

/// Default location on disk where the client looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/tapduel.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "TAPDUEL_CONFIG_PATH";

const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);
const DEFAULT_SEED_ATTEMPTS: u32 = 3;
const DEFAULT_SEED_RETRY_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq)]
/// Timing and geometry knobs shared by the session controller and the render engine.
pub struct EngineConfig {
    /// Wait between subscribing and fetching the seed snapshot.
    pub settle_delay: Duration,
    /// Lobby polling period.
    pub poll_interval: Duration,
    /// Seed fetch attempts before giving up.
    pub seed_attempts: u32,
    /// Pause between seed attempts.
    pub seed_retry_delay: Duration,
    /// Coordinate space attached to spawns that do not name one.
    pub reference_canvas: ReferenceCanvas,
    /// Radius used by the hit test.
    pub hit_radius: HitRadiusPolicy,
}

impl EngineConfig {
    /// Load the configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(config) => {
                    info!(
                        path = %path.display(),
                        poll_interval_ms = config.poll_interval.as_millis() as u64,
                        canvas_version = config.reference_canvas.version,
                        "loaded engine config"
                    );
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

    /// Parse a JSON document; absent fields keep their defaults.
    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
            poll_interval: DEFAULT_POLL_INTERVAL,
            seed_attempts: DEFAULT_SEED_ATTEMPTS,
            seed_retry_delay: DEFAULT_SEED_RETRY_DELAY,
            reference_canvas: ReferenceCanvas::V1,
            hit_radius: HitRadiusPolicy::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    settle_delay_ms: Option<u64>,
    poll_interval_ms: Option<u64>,
    seed_attempts: Option<u32>,
    seed_retry_delay_ms: Option<u64>,
    reference_canvas: Option<ReferenceCanvas>,
    hit_radius: Option<HitRadiusPolicy>,
}

impl From<RawConfig> for EngineConfig {
    fn from(raw: RawConfig) -> Self {
        let defaults = Self::default();
        let reference_canvas = match raw.reference_canvas {
            Some(canvas) if canvas.is_valid() => canvas,
            Some(canvas) => {
                warn!(?canvas, "ignoring degenerate reference canvas");
                defaults.reference_canvas
            }
            None => defaults.reference_canvas,
        };
        Self {
            settle_delay: raw
                .settle_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.settle_delay),
            poll_interval: raw
                .poll_interval_ms
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            seed_attempts: raw.seed_attempts.unwrap_or(defaults.seed_attempts).max(1),
            seed_retry_delay: raw
                .seed_retry_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.seed_retry_delay),
            reference_canvas,
            hit_radius: raw.hit_radius.unwrap_or(defaults.hit_radius),
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
