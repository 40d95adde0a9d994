use clap::{Args, Subcommand};
use serde::Serialize;
use serde_json::{Map, Value};

use dockyard::config;
use dockyard::shell::LocalShell;
use dockyard::Context;
use dockyard::defaults::{self, Defaults, DockyardConfig};

use super::CmdResult;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Display configuration (defaults merged with dockyard.json)
    Show {
        /// Show only built-in defaults (ignore dockyard.json)
        #[arg(long)]
        builtin: bool,
    },
    /// Set a value at a JSON pointer path
    Set {
        /// JSON pointer path (e.g., /settings/docker_command_template)
        pointer: String,
        /// Value to set (JSON; bare words are taken as strings)
        value: String,
    },
    /// Remove the value at a JSON pointer path
    Remove {
        /// JSON pointer path (e.g., /settings/bin~1docker)
        pointer: String,
    },
    /// Reset configuration to built-in defaults (deletes dockyard.json)
    Reset,
    /// Show the path to dockyard.json
    Path,
}

#[derive(Debug, Default, Serialize)]
pub struct ConfigOutput {
    command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    config: Option<DockyardConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    defaults: Option<Defaults>,
    /// Effective settings; lazily located binaries show as null until first use.
    #[serde(skip_serializing_if = "Option::is_none")]
    settings: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exists: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pointer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    removed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    deleted: Option<bool>,
}

pub fn run(args: ConfigArgs) -> CmdResult<ConfigOutput> {
    match args.command {
        ConfigCommand::Show { builtin } => show(builtin),
        ConfigCommand::Set { pointer, value } => set(&pointer, &value),
        ConfigCommand::Remove { pointer } => remove(&pointer),
        ConfigCommand::Reset => reset(),
        ConfigCommand::Path => path(),
    }
}

fn show(builtin: bool) -> CmdResult<ConfigOutput> {
    let output = if builtin {
        ConfigOutput {
            command: "config.show".to_string(),
            defaults: Some(defaults::builtin_defaults()),
            ..Default::default()
        }
    } else {
        let config = defaults::load_config_strict()?;
        let settings = Context::with_config(&config, Box::new(LocalShell))
            .settings()
            .snapshot();
        ConfigOutput {
            command: "config.show".to_string(),
            config: Some(config),
            settings: Some(settings),
            ..Default::default()
        }
    };
    Ok((output, 0))
}

fn set(pointer: &str, value_str: &str) -> CmdResult<ConfigOutput> {
    let value = dockyard::utils::args::parse_value(value_str);
    let current = defaults::load_config_strict()?;
    let config = config::set_config_value(&current, pointer, value.clone())?;
    defaults::save_config(&config)?;

    Ok((
        ConfigOutput {
            command: "config.set".to_string(),
            config: Some(config),
            pointer: Some(pointer.to_string()),
            value: Some(value),
            ..Default::default()
        },
        0,
    ))
}

fn remove(pointer: &str) -> CmdResult<ConfigOutput> {
    let current = defaults::load_config_strict()?;
    let (config, removed) = config::remove_config_value(&current, pointer)?;
    if removed {
        defaults::save_config(&config)?;
    }

    Ok((
        ConfigOutput {
            command: "config.remove".to_string(),
            config: Some(config),
            pointer: Some(pointer.to_string()),
            removed: Some(removed),
            ..Default::default()
        },
        0,
    ))
}

fn reset() -> CmdResult<ConfigOutput> {
    let deleted = defaults::reset_config()?;

    Ok((
        ConfigOutput {
            command: "config.reset".to_string(),
            defaults: Some(defaults::builtin_defaults()),
            path: Some(defaults::config_path()?),
            deleted: Some(deleted),
            ..Default::default()
        },
        0,
    ))
}

fn path() -> CmdResult<ConfigOutput> {
    Ok((
        ConfigOutput {
            command: "config.path".to_string(),
            path: Some(defaults::config_path()?),
            exists: Some(defaults::config_exists()),
            ..Default::default()
        },
        0,
    ))
}
