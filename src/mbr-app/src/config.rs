// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the shared configuration file.
pub const CONFIG_FILE_NAME: &str = "mbr-rs.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    ReadError(PathBuf, String),

    #[error("Failed to parse config file {0}: {1}")]
    ParseError(PathBuf, String),
}

/// Default search paths for `mbr-rs.toml`: current directory, XDG config
/// directory, then /etc.
pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("mbr-rs").join(CONFIG_FILE_NAME));
    }
    paths.push(PathBuf::from("/etc/mbr-rs").join(CONFIG_FILE_NAME));
    paths
}

/// Extract and deserialize a named section from a TOML file.
///
/// `Ok(None)` when the section is absent.
fn load_section_from_file<T: DeserializeOwned>(
    path: &Path,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e.to_string()))?;
    parse_section(&content, key).map_err(|e| ConfigError::ParseError(path.to_path_buf(), e))
}

fn parse_section<T: DeserializeOwned>(content: &str, key: &str) -> Result<Option<T>, String> {
    let table: toml::Table = toml::from_str(content).map_err(|e| e.to_string())?;
    let Some(section) = table.get(key) else {
        return Ok(None);
    };
    // Round-trip through a string so serde defaults apply to the section.
    let section_toml = toml::to_string(section).map_err(|e| e.to_string())?;
    toml::from_str::<T>(&section_toml)
        .map(Some)
        .map_err(|e| e.to_string())
}

/// A configuration type stored as one section of `mbr-rs.toml`.
pub trait ConfigFile: Sized + Default + DeserializeOwned {
    /// Section key, e.g. `"mbr-modem"`.
    fn section_key() -> &'static str;

    /// Load the section from a specific file. A file without the section
    /// is an error.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        load_section_from_file::<Self>(path, Self::section_key())?.ok_or_else(|| {
            ConfigError::ParseError(
                path.to_path_buf(),
                format!("missing [{}] section", Self::section_key()),
            )
        })
    }

    /// Load from the first default path holding the section, or fall back
    /// to defaults when there is none.
    fn load_from_default_paths() -> Result<(Self, Option<PathBuf>), ConfigError> {
        Self::load_from_paths(&config_search_paths())
    }

    fn load_from_paths(paths: &[PathBuf]) -> Result<(Self, Option<PathBuf>), ConfigError> {
        for path in paths {
            if path.exists() {
                if let Some(cfg) = load_section_from_file::<Self>(path, Self::section_key())? {
                    return Ok((cfg, Some(path.clone())));
                }
            }
        }
        Ok((Self::default(), None))
    }
}
