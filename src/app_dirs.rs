//! Resolve the configuration directory for `fofax`.
//!
//! `FOFAX_CONFIG_DIR` wins when set, otherwise the platform location from the
//! `directories` crate is used.

use std::env;
use std::path::PathBuf;

use directories::ProjectDirs;

use crate::error::SettingsError;

const QUALIFIER: &str = "io";
const ORGANIZATION: &str = "fofax";
const APPLICATION: &str = "fofax";

pub const CONFIG_DIR_ENV: &str = "FOFAX_CONFIG_DIR";

/// An empty value counts as unset.
fn dir_from_env(name: &str) -> Option<PathBuf> {
    let value = env::var_os(name)?;
    if value.is_empty() {
        None
    } else {
        Some(PathBuf::from(value))
    }
}

pub fn config_dir() -> Result<PathBuf, SettingsError> {
    if let Some(dir) = dir_from_env(CONFIG_DIR_ENV) {
        return Ok(dir);
    }

    ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
        .map(|dirs| dirs.config_local_dir().to_path_buf())
        .ok_or(SettingsError::ConfigDir)
}
