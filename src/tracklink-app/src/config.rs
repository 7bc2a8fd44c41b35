// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    ReadError(PathBuf, String),

    #[error("Failed to parse config file {0}: {1}")]
    ParseError(PathBuf, String),

    #[error("Invalid configuration in {0}: {1}")]
    Invalid(PathBuf, String),
}

/// Returns the default search paths for `tracklink.toml`
/// (current directory → XDG config → /etc).
fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("tracklink.toml")];
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("tracklink").join("tracklink.toml"));
    }
    paths.push(PathBuf::from("/etc/tracklink/tracklink.toml"));
    paths
}

/// Extract and deserialize a named section from TOML text.
///
/// `origin` is only used for error messages.
fn load_section_from_str<T: DeserializeOwned>(
    origin: &Path,
    content: &str,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    let table: toml::Table = toml::from_str(content)
        .map_err(|e| ConfigError::ParseError(origin.to_path_buf(), e.to_string()))?;

    let Some(section) = table.get(key) else {
        return Ok(None);
    };

    // Re-serialize the section then parse as T so all serde defaults apply.
    let section_toml = toml::to_string(section)
        .map_err(|e| ConfigError::ParseError(origin.to_path_buf(), e.to_string()))?;
    let cfg = toml::from_str::<T>(&section_toml)
        .map_err(|e| ConfigError::ParseError(origin.to_path_buf(), e.to_string()))?;
    Ok(Some(cfg))
}

fn load_section_from_file<T: DeserializeOwned>(
    path: &Path,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e.to_string()))?;
    load_section_from_str(path, &content, key)
}

/// Trait for loading configuration from a `tracklink.toml` section.
pub trait ConfigFile: Sized + Default + DeserializeOwned {
    /// Section key in `tracklink.toml` (e.g. `"tracklink-client"`).
    fn section_key() -> &'static str;

    /// Check cross-field constraints after parsing.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }

    /// Load the section from a specific file path.
    ///
    /// Returns an error if the file cannot be read, is not valid TOML, does
    /// not contain the expected `[<section_key>]` header or fails validation.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let cfg = load_section_from_file::<Self>(path, Self::section_key())?.ok_or_else(|| {
            ConfigError::ParseError(
                path.to_path_buf(),
                format!("missing [{}] section", Self::section_key()),
            )
        })?;
        cfg.validate()
            .map_err(|e| ConfigError::Invalid(path.to_path_buf(), e))?;
        Ok(cfg)
    }

    /// Parse the section out of TOML text that is already in memory.
    ///
    /// A missing section yields `Default::default()`.
    fn load_from_str(content: &str) -> Result<Self, ConfigError> {
        let origin = Path::new("<inline>");
        let cfg = load_section_from_str::<Self>(origin, content, Self::section_key())?
            .unwrap_or_default();
        cfg.validate()
            .map_err(|e| ConfigError::Invalid(origin.to_path_buf(), e))?;
        Ok(cfg)
    }

    /// Search default paths (`tracklink.toml` in CWD → XDG → /etc) and load
    /// the first file that contains the expected section.
    ///
    /// Returns `(config, path_where_found)` or `(Default::default(), None)`
    /// when no config file is found.
    fn load_from_default_paths() -> Result<(Self, Option<PathBuf>), ConfigError> {
        for path in config_search_paths() {
            if path.exists() {
                if let Some(cfg) = load_section_from_file::<Self>(&path, Self::section_key())? {
                    cfg.validate()
                        .map_err(|e| ConfigError::Invalid(path.clone(), e))?;
                    return Ok((cfg, Some(path)));
                }
            }
        }
        Ok((Self::default(), None))
    }
}
