//! Configuration loading and root folder resolution

use crate::{Error, Result};
use std::path::PathBuf;

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&str>, env_var_name: &str) -> Result<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Ok(PathBuf::from(path));
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    // Priority 3: TOML config file
    if let Ok(config_path) = locate_config_file() {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(root_folder) = config.get("root_folder").and_then(|v| v.as_str()) {
                    return Ok(PathBuf::from(root_folder));
                }
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    Ok(default_root_folder())
}

/// Get default configuration file path for the platform
fn locate_config_file() -> Result<PathBuf> {
    let candidate = dirs::config_dir()
        .map(|d| d.join("starlog").join("config.toml"))
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;

    if candidate.exists() {
        return Ok(candidate);
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/starlog/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
    }

    Err(Error::Config(format!("Config file not found: {:?}", candidate)))
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("starlog"))
        .unwrap_or_else(|| PathBuf::from("./starlog_data"))
}
