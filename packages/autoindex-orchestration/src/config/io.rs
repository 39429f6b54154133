//! Configuration I/O (YAML loading)

use super::error::{ConfigError, ConfigResult};
use super::{OrchestratorConfig, RetryPolicy, SelectionPolicy, TolerancePolicy, ValidationPolicy};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const SUPPORTED_VERSIONS: &[u32] = &[1];

/// YAML Schema v1
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigExportV1 {
    /// Schema version (always 1 for v1)
    pub version: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<SelectionPolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryPolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<TolerancePolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationPolicy>,
}

impl OrchestratorConfig {
    pub fn from_yaml(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Missing sections fall back to defaults; the result is validated.
    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let export: ConfigExportV1 = serde_yaml::from_str(content)?;

        if !SUPPORTED_VERSIONS.contains(&export.version) {
            return Err(ConfigError::UnsupportedVersion {
                found: export.version,
                supported: SUPPORTED_VERSIONS.to_vec(),
            });
        }

        let config = Self {
            selection: export.selection.unwrap_or_default(),
            retry: export.retry.unwrap_or_default(),
            tolerance: export.tolerance.unwrap_or_default(),
            validation: export.validation.unwrap_or_default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> ConfigResult<String> {
        let export = ConfigExportV1 {
            version: 1,
            selection: Some(self.selection.clone()),
            retry: Some(self.retry.clone()),
            tolerance: Some(self.tolerance.clone()),
            validation: Some(self.validation.clone()),
        };

        serde_yaml::to_string(&export).map_err(ConfigError::Yaml)
    }
}
