use std::path::Path;

use serde::{Deserialize, Serialize};

use ptrack_fabric::QueueConfig;
use ptrack_social::LocalCharacter;
use ptrack_visibility::DEFAULT_REASON;

use crate::error::{SdkError, SdkResult};

/// Runtime configuration, read from TOML. Every field has a default.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Background queue for snapshot reconciliation.
    pub queue: QueueConfig,
    /// Per-subscriber notification buffer.
    pub notification_capacity: usize,
    /// Reason tag written on visibility entries this tool adds.
    pub visibility_reason: String,
    /// Character treated as logged in when no host client supplies one.
    pub identity: Option<LocalCharacter>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            queue: QueueConfig::default(),
            notification_capacity: 256,
            visibility_reason: DEFAULT_REASON.to_string(),
            identity: None,
        }
    }
}

impl TrackerConfig {
    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> SdkResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML file.
    pub fn load(path: &Path) -> SdkResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| SdkError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> SdkResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
