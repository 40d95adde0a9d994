use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::paths;
use crate::ssh::HostConfig;
use crate::task::TaskDefinition;

/// Default command template used to run a command inside a container.
pub const DEFAULT_COMMAND_TEMPLATE: &str =
    "{{bin/docker}} exec -i {{container}} bash -c {{?command}}";

/// Root configuration structure for dockyard.json
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DockyardConfig {
    #[serde(default)]
    pub defaults: Defaults,

    /// Explicit setting values (e.g. `docker_command_template`, `bin/docker`).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub settings: Map<String, Value>,

    /// SSH host to run commands on. Commands run locally when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<HostConfig>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tasks: BTreeMap<String, TaskDefinition>,
}

/// All configurable defaults that can be overridden via dockyard.json
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Defaults {
    #[serde(default = "default_docker")]
    pub docker: DockerDefaults,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            docker: default_docker(),
        }
    }
}

/// Docker related defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockerDefaults {
    #[serde(default = "default_command_template")]
    pub default_command_template: String,

    #[serde(default = "default_machine_version")]
    pub machine_version: String,

    #[serde(default = "default_machine_install_path")]
    pub machine_install_path: String,
}

// =============================================================================
// Default value functions
// =============================================================================

fn default_docker() -> DockerDefaults {
    DockerDefaults {
        default_command_template: default_command_template(),
        machine_version: default_machine_version(),
        machine_install_path: default_machine_install_path(),
    }
}

fn default_command_template() -> String {
    DEFAULT_COMMAND_TEMPLATE.to_string()
}

fn default_machine_version() -> String {
    "v0.12.2".to_string()
}

fn default_machine_install_path() -> String {
    "/usr/bin/docker-machine".to_string()
}

// =============================================================================
// Loading functions
// =============================================================================

/// Load dockyard.json, returning built-in defaults when the file is missing.
///
/// Unreadable or invalid files are reported.
pub fn load_config_strict() -> crate::Result<DockyardConfig> {
    let path = paths::dockyard_json()?;
    load_config_from(&path)
}

/// Load a config file from an explicit path.
pub fn load_config_from(path: &Path) -> crate::Result<DockyardConfig> {
    if !path.exists() {
        return Ok(DockyardConfig::default());
    }

    let content = fs::read_to_string(path).map_err(|e| {
        crate::Error::internal_io(e.to_string(), Some(format!("read {}", path.display())))
    })?;

    serde_json::from_str(&content)
        .map_err(|e| crate::Error::config_invalid_json(path.display().to_string(), e))
}

/// Save config to dockyard.json file (creates if missing).
pub fn save_config(config: &DockyardConfig) -> crate::Result<()> {
    let path = paths::dockyard_json()?;
    save_config_to(config, &path)
}

pub fn save_config_to(config: &DockyardConfig, path: &Path) -> crate::Result<()> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            crate::Error::internal_io(e.to_string(), Some(format!("create {}", parent.display())))
        })?;
    }

    let content = serde_json::to_string_pretty(config).map_err(|e| {
        crate::Error::internal_json(e.to_string(), Some("serialize dockyard.json".to_string()))
    })?;

    fs::write(path, content).map_err(|e| {
        crate::Error::internal_io(e.to_string(), Some(format!("write {}", path.display())))
    })?;

    Ok(())
}

/// Delete dockyard.json file (reset to defaults)
pub fn reset_config() -> crate::Result<bool> {
    let path = paths::dockyard_json()?;

    if path.exists() {
        fs::remove_file(&path).map_err(|e| {
            crate::Error::internal_io(e.to_string(), Some(format!("delete {}", path.display())))
        })?;
        Ok(true)
    } else {
        Ok(false)
    }
}

/// Check if dockyard.json file exists
pub fn config_exists() -> bool {
    paths::dockyard_json()
        .map(|p| p.exists())
        .unwrap_or(false)
}

/// Get the path to dockyard.json (for display purposes)
pub fn config_path() -> crate::Result<String> {
    Ok(paths::dockyard_json()?.display().to_string())
}

/// Get built-in defaults (ignoring any file config)
pub fn builtin_defaults() -> Defaults {
    Defaults::default()
}
