//! Compiler configuration.
//!
//! Optional YAML file passed with `--config`. Every field has a default, so
//! an empty file (or no file at all) is valid.
//!
//! ```yaml
//! format: yaml
//! tree_suffix: tree
//! contract_suffix: contract
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Serialization format for written artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFormat {
    #[default]
    Json,
    Yaml,
}

impl ArtifactFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
        }
    }

    /// Serializes a value in this format.
    pub fn render<T: Serialize>(self, value: &T) -> Result<String, String> {
        match self {
            Self::Json => serde_json::to_string_pretty(value)
                .map_err(|e| format!("JSON serialization failed: {e}")),
            Self::Yaml => {
                serde_yaml::to_string(value).map_err(|e| format!("YAML serialization failed: {e}"))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    pub format: ArtifactFormat,
    /// Middle extension of the resolved tree artifact.
    pub tree_suffix: String,
    /// Middle extension of the emitter contract artifact.
    pub contract_suffix: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            format: ArtifactFormat::Json,
            tree_suffix: "tree".to_string(),
            contract_suffix: "contract".to_string(),
        }
    }
}

impl CompilerConfig {
    /// Loads configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, String> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|err| format!("Failed to read config '{}': {err}", path.display()))?;
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(&raw)
            .map_err(|err| format!("Invalid config '{}': {err}", path.display()))?;
        config
            .validate()
            .map_err(|err| format!("Invalid config '{}': {err}", path.display()))?;
        Ok(config)
    }

    /// The two artifacts must land in different files.
    pub fn validate(&self) -> Result<(), String> {
        if self.tree_suffix == self.contract_suffix {
            return Err(format!(
                "tree_suffix and contract_suffix are both '{}'",
                self.tree_suffix
            ));
        }
        Ok(())
    }
}
