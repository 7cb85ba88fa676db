use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::constants;
use crate::paths::config_path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub control: ControlConfig,
    pub steps: StepConfig,
    pub bounds: BoundsConfig,
    pub paths: PathConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub tick_ms: u64,
    pub hold_threshold_secs: f64,
    pub selection_timeout_secs: f64,
    pub broadcast_interval_ms: u64,
    pub save_interval_secs: u64,
}

/// Per-detent parameter deltas applied by the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StepConfig {
    pub amplitude: f64,
    pub frequency: f64,
    pub phase: f64,
    pub harmonic: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundsConfig {
    pub frequency_min: f64,
    pub frequency_max: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    pub state_file: Option<PathBuf>,
    pub defaults_file: Option<PathBuf>,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            tick_ms: constants::DEFAULT_TICK_MS,
            hold_threshold_secs: constants::DEFAULT_HOLD_THRESHOLD_SECS,
            selection_timeout_secs: constants::DEFAULT_SELECTION_TIMEOUT_SECS,
            broadcast_interval_ms: constants::DEFAULT_BROADCAST_INTERVAL_MS,
            save_interval_secs: constants::DEFAULT_SAVE_INTERVAL_SECS,
        }
    }
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            amplitude: constants::DEFAULT_AMPLITUDE_STEP,
            frequency: constants::DEFAULT_FREQUENCY_STEP,
            phase: constants::DEFAULT_PHASE_STEP,
            harmonic: constants::DEFAULT_HARMONIC_STEP,
        }
    }
}

impl Default for BoundsConfig {
    fn default() -> Self {
        Self {
            frequency_min: constants::DEFAULT_FREQUENCY_MIN,
            frequency_max: constants::DEFAULT_FREQUENCY_MAX,
        }
    }
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            state_file: None,
            defaults_file: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            control: ControlConfig::default(),
            steps: StepConfig::default(),
            bounds: BoundsConfig::default(),
            paths: PathConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = config_path();
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            return Ok(serde_json::from_str(&contents)?);
        }
        Ok(Self::default())
    }

    pub fn save(&self) -> Result<()> {
        let path = config_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.control.tick_ms)
    }

    pub fn hold_threshold(&self) -> Duration {
        Duration::from_secs_f64(self.control.hold_threshold_secs)
    }

    pub fn selection_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.control.selection_timeout_secs)
    }

    pub fn broadcast_interval(&self) -> Duration {
        Duration::from_millis(self.control.broadcast_interval_ms)
    }

    pub fn save_interval(&self) -> Duration {
        Duration::from_secs(self.control.save_interval_secs)
    }

    pub fn state_file(&self) -> PathBuf {
        self.paths
            .state_file
            .clone()
            .unwrap_or_else(crate::paths::state_path)
    }

    pub fn defaults_file(&self) -> PathBuf {
        self.paths
            .defaults_file
            .clone()
            .unwrap_or_else(crate::paths::defaults_path)
    }
}
