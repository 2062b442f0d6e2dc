//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/stackgraph/stackgraph.toml`
//! 3. Local config: `<manifest_dir>/.stackgraph.toml`
//! 4. Extra config file (`--config`)
//! 5. Environment variables: `STACKGRAPH_*` prefix

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;

/// Which ordering rules the aspect pass registers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RuleSettings {
    /// Detach capacity-provider associations from their target cluster
    pub detach_association: bool,
    /// Order services after their cluster's associations
    pub service_association_edges: bool,
}

impl Default for RuleSettings {
    fn default() -> Self {
        Self {
            detach_association: true,
            service_association_edges: true,
        }
    }
}

/// Terminal output preferences.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OutputSettings {
    pub color: bool,
    /// Print build waves instead of a flat order
    pub show_waves: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            color: true,
            show_waves: false,
        }
    }
}

/// Raw settings for intermediate parsing (`None` means "not specified, inherit").
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub rules: RawRuleSettings,
    pub output: RawOutputSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawRuleSettings {
    pub detach_association: Option<bool>,
    pub service_association_edges: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawOutputSettings {
    pub color: Option<bool>,
    pub show_waves: Option<bool>,
}

/// Unified configuration for stackgraph.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub rules: RuleSettings,
    pub output: OutputSettings,
}

/// Get the XDG config directory for stackgraph.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "stackgraph").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("stackgraph.toml"))
}

/// Get the path to the local config file next to a manifest.
pub fn local_config_path(manifest_dir: &Path) -> PathBuf {
    manifest_dir.join(".stackgraph.toml")
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    /// Overlay wins where it specifies a value.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            rules: RuleSettings {
                detach_association: overlay
                    .rules
                    .detach_association
                    .unwrap_or(self.rules.detach_association),
                service_association_edges: overlay
                    .rules
                    .service_association_edges
                    .unwrap_or(self.rules.service_association_edges),
            },
            output: OutputSettings {
                color: overlay.output.color.unwrap_or(self.output.color),
                show_waves: overlay.output.show_waves.unwrap_or(self.output.show_waves),
            },
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `manifest_dir` - Optional directory of the manifest for local config
    /// * `extra` - Optional config file merged after the local one
    pub fn load(
        manifest_dir: Option<&Path>,
        extra: Option<&Path>,
    ) -> Result<Self, ApplicationError> {
        // 1. Start with defaults
        let mut current = Self::default();

        // 2. Global config
        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                let raw = load_raw_settings(&global_path)?;
                current = current.merge_with(&raw);
            }
        }

        // 3. Local config next to the manifest
        if let Some(dir) = manifest_dir {
            current = current.merge_file(&local_config_path(dir))?;
        }

        // 4. Extra config file
        if let Some(path) = extra {
            current = current.merge_file(path)?;
        }

        // 5. Environment variables (explicit override)
        Self::apply_env_overrides(current)
    }

    /// Merge a config file onto self if it exists.
    pub fn merge_file(self, path: &Path) -> Result<Self, ApplicationError> {
        if !path.exists() {
            return Ok(self);
        }
        let raw = load_raw_settings(path)?;
        Ok(self.merge_with(&raw))
    }

    /// Apply STACKGRAPH_* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        // Use config crate just for env var parsing
        let config = Config::builder()
            .add_source(
                Environment::with_prefix("STACKGRAPH")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(config_err)?;

        if let Ok(val) = config.get_bool("rules.detach_association") {
            settings.rules.detach_association = val;
        }
        if let Ok(val) = config.get_bool("rules.service_association_edges") {
            settings.rules.service_association_edges = val;
        }
        if let Ok(val) = config.get_bool("output.color") {
            settings.output.color = val;
        }
        if let Ok(val) = config.get_bool("output.show_waves") {
            settings.output.show_waves = val;
        }

        Ok(settings)
    }

    /// Serialize the effective settings as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: e.to_string(),
        })
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}
