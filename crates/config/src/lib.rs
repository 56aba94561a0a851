//! Configuration loading for Glyco
//!
//! Everything lives in a single directory (~/.config/glyco/): sync tuning,
//! feed credentials, and the local reading cache.
//!
//! Call [`init`] at application startup to bootstrap the config directory.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Name of the directory under the platform config dir
const APP_DIR: &str = "glyco";

/// Initialize the Glyco config directory.
///
/// Creates ~/.config/glyco/ if it doesn't exist.
pub fn init() -> Result<PathBuf> {
    ensure_config_dir()
}

/// Get the Glyco config directory (~/.config/glyco/)
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(APP_DIR))
}

/// Get the path to a file within the Glyco config directory
pub fn config_path(filename: &str) -> Option<PathBuf> {
    config_dir().map(|p| p.join(filename))
}

/// Load and parse a JSON file from the Glyco config directory
pub fn load_json<T: DeserializeOwned>(filename: &str) -> Result<T> {
    let path = config_path(filename).context("Could not determine config directory")?;
    load_json_file(&path)
}

/// Load and parse a JSON file from an arbitrary path
pub fn load_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Check if a file exists in the Glyco config directory
pub fn config_exists(filename: &str) -> bool {
    config_path(filename).is_some_and(|p| p.exists())
}

/// Ensure the Glyco config directory exists
pub fn ensure_config_dir() -> Result<PathBuf> {
    let dir = config_dir().context("Could not determine config directory")?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
    Ok(dir)
}

/// Save a value as pretty JSON into the Glyco config directory
pub fn save_json<T: serde::Serialize>(filename: &str, value: &T) -> Result<()> {
    let dir = ensure_config_dir()?;
    save_json_file(&dir.join(filename), value)
}

/// Save a value as pretty JSON to an arbitrary path
pub fn save_json_file<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;
    Ok(())
}
