//! Configuration loading with env-var overrides.
//!
//! Looks for `<root_key>.toml` in the config search path and layers
//! `<ROOT_KEY>_*` environment variables on top of it.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::AppError;

use super::settings::Settings;

/// Env var naming the directory that holds the config file.
pub const CFG_PATH_ENV: &str = "PEER_CFG_PATH";

/// System-wide fallback config directory.
const SYSTEM_CFG_DIR: &str = "/etc/peer";

/// Directories searched for the config file, in order.
///
/// `$PEER_CFG_PATH` is authoritative when set; otherwise the current
/// directory then `/etc/peer`.
pub fn config_search_path() -> Vec<PathBuf> {
    if let Ok(dir) = env::var(CFG_PATH_ENV) {
        if !dir.trim().is_empty() {
            return vec![expand_home(dir.trim())];
        }
    }
    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    vec![cwd, PathBuf::from(SYSTEM_CFG_DIR)]
}

/// Load settings for `root_key` from the real environment and search path.
pub fn load(root_key: &str) -> Result<Settings, AppError> {
    load_from(&config_search_path(), root_key, utf8_vars(env::vars_os()))
}

/// Keep only variables whose name and value are valid UTF-8; the rest can
/// never name a setting.
fn utf8_vars(
    vars: impl IntoIterator<Item = (OsString, OsString)>,
) -> impl Iterator<Item = (String, String)> {
    vars.into_iter()
        .filter_map(|(name, value)| Some((name.into_string().ok()?, value.into_string().ok()?)))
}

/// Internal loader: accepts an explicit search path and env snapshot.
/// Tests pass env vars directly instead of mutating the process environment.
///
/// A config file that is absent from every directory is not an error; one
/// that exists but cannot be read or parsed is.
pub fn load_from(
    search: &[PathBuf],
    root_key: &str,
    env_vars: impl IntoIterator<Item = (String, String)>,
) -> Result<Settings, AppError> {
    let file_name = format!("{root_key}.toml");

    for dir in search {
        let path = dir.join(&file_name);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => {
                return Err(AppError::Config(format!("cannot read {}: {e}", path.display())));
            }
        };

        let value: toml::Value = toml::from_str(&raw)
            .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| dir.clone());
        return Ok(Settings::new(root_key, Some(value), Some(path), base_dir, env_vars));
    }

    let base_dir = search.first().cloned().unwrap_or_else(|| PathBuf::from("."));
    Ok(Settings::new(root_key, None, None, base_dir, env_vars))
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}
