//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Bracketed capture settings.
    #[serde(default)]
    pub capture: CaptureDefaults,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Interpolation strategy for orientation lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InterpolationKind {
    /// Two-point linear fit.
    Linear,
    /// Natural cubic spline over a four-sample bracket.
    #[default]
    Cubic,
}

impl std::str::FromStr for InterpolationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" => Ok(Self::Linear),
            "cubic" | "spline" => Ok(Self::Cubic),
            other => Err(format!("unknown interpolation kind: {other}")),
        }
    }
}

/// Bracket and motion-stream parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureDefaults {
    /// Upper bound on frames per bracket (further limited by the device).
    pub max_bracket_count: usize,

    /// Centre exposure bias in EV.
    pub exposure_bias_ev: f32,

    /// EV spacing between consecutive brackets. Zero gives identical exposures.
    pub bias_step_ev: f32,

    /// Requested motion sampling interval.
    pub motion_interval_ms: u64,

    /// How long to wait for the first motion sample before capturing.
    pub first_sample_timeout_ms: u64,

    /// How long a finalizing session waits for orientation brackets.
    pub orientation_wait_ms: u64,

    /// How long to wait for the capture source between frames.
    pub frame_timeout_ms: u64,

    /// Orientation interpolation strategy.
    pub interpolation: InterpolationKind,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "steadystack=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for CaptureDefaults {
    fn default() -> Self {
        Self {
            max_bracket_count: 5,
            exposure_bias_ev: 0.0,
            bias_step_ev: 0.0,
            motion_interval_ms: 10,
            first_sample_timeout_ms: 500,
            orientation_wait_ms: 250,
            frame_timeout_ms: 5000,
            interpolation: InterpolationKind::Cubic,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_file_path())
    }

    /// Load config from an explicit path, falling back to defaults.
    pub fn load_from(config_path: &std::path::Path) -> Self {
        if config_path.exists() {
            match std::fs::read_to_string(config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("steadystack").join("config.json")
}
