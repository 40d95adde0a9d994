use crate::error::{Error, Result};
use std::env;
use std::path::PathBuf;

/// Overrides the config directory (used by CI and isolated runs).
pub const CONFIG_DIR_ENV: &str = "DOCKYARD_CONFIG_DIR";

/// Base dockyard config directory (universal ~/.config/dockyard/ on all platforms)
pub fn dockyard() -> Result<PathBuf> {
    if let Ok(dir) = env::var(CONFIG_DIR_ENV) {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(shellexpand::tilde(&dir).to_string()));
        }
    }

    #[cfg(windows)]
    {
        let appdata = env::var("APPDATA").map_err(|_| {
            Error::internal_unexpected(
                "APPDATA environment variable not set on Windows".to_string(),
            )
        })?;
        Ok(PathBuf::from(appdata).join("dockyard"))
    }

    #[cfg(not(windows))]
    {
        let home = env::var("HOME").map_err(|_| {
            Error::internal_unexpected(
                "HOME environment variable not set on Unix-like system".to_string(),
            )
        })?;
        Ok(PathBuf::from(home).join(".config").join("dockyard"))
    }
}

/// Global dockyard.json config file path
pub fn dockyard_json() -> Result<PathBuf> {
    Ok(dockyard()?.join("dockyard.json"))
}
