//! Solver configuration loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file at all) is valid:
//!
//! ```toml
//! [rotation]
//! unlock-level = 10
//! player-level = 12
//!
//! [scheduler]
//! steps-per-frame = 64
//! max-steps = 250000
//!
//! [session]
//! cancel-policy = "rollback"
//! ```

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::ConfigError;
use crate::scheduler::{FrameScheduler, DEFAULT_STEPS_PER_FRAME};
use crate::session::CancelPolicy;
use crate::upgrades::RotationGate;

/// Player level at which upgrade rotation unlocks by default.
pub const DEFAULT_UNLOCK_LEVEL: u32 = 10;

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct RotationConfig {
    pub unlock_level: u32,
    pub player_level: u32,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            unlock_level: DEFAULT_UNLOCK_LEVEL,
            player_level: 0,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct SchedulerConfig {
    pub steps_per_frame: usize,
    pub max_steps: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            steps_per_frame: DEFAULT_STEPS_PER_FRAME,
            max_steps: None,
        }
    }
}

#[derive(Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct SessionConfig {
    pub cancel_policy: CancelPolicy,
}

#[derive(Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct SolverConfig {
    pub rotation: RotationConfig,
    pub scheduler: SchedulerConfig,
    pub session: SessionConfig,
}

impl SolverConfig {
    /// Loads a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), ?config, "loaded config");
        Ok(config)
    }

    /// Loads `path` if given, otherwise returns the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    pub fn rotation_gate(&self) -> RotationGate {
        RotationGate {
            unlock_level: self.rotation.unlock_level,
            player_level: self.rotation.player_level,
        }
    }

    /// Rotations allowed by the progression gate.
    pub fn max_rotations(&self) -> u8 {
        self.rotation_gate().max_rotations()
    }

    pub fn frame_scheduler(&self) -> FrameScheduler {
        FrameScheduler::new(self.scheduler.steps_per_frame).with_max_steps(self.scheduler.max_steps)
    }
}
