// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 TrackShred Contributors
//! Configuration management for TrackShred.
//!
//! Configuration is a plain JSON object loaded from
//! `~/.config/trackshred/config.json` (or an explicit `--config` path)
//! and treated as read-only input to the orchestrator. Missing or
//! unknown fields fall back to defaults so old config files keep
//! working across releases.

use crate::error::{Result, ShredError};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Default number of overwrite passes.
pub const DEFAULT_SHRED_PASSES: u32 = 3;

/// Lowest accepted pass count.
pub const MIN_SHRED_PASSES: u32 = 1;

/// Highest accepted pass count; more passes add time, not security.
pub const MAX_SHRED_PASSES: u32 = 10;

/// Pass count used by the paranoid profile.
pub const PARANOID_SHRED_PASSES: u32 = 7;

/// Fallback log destination when the configured one is unusable.
pub const DEFAULT_LOG_FILE: &str = "/tmp/trackshred.log";

fn default_passes() -> u32 {
    DEFAULT_SHRED_PASSES
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from(DEFAULT_LOG_FILE)
}

fn default_true() -> bool {
    true
}

/// Resolved runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of overwrite passes per file, in `[1, 10]`.
    pub shred_passes: u32,
    /// Log verbosity (`error`, `warn`, `info`, `debug`, `trace`).
    pub log_level: String,
    /// Log file destination.
    pub log_file: PathBuf,
    /// Sweep thumbnail caches during a deep sweep.
    pub clean_thumbnails: bool,
    /// Sweep recently-used lists during a deep sweep.
    pub clean_recent_files: bool,
    /// Empty the trash store during a deep sweep.
    pub clean_trash: bool,
    /// Clear shell history files. Off by default: this destroys the
    /// user's own operational history, not just attacker-visible traces.
    pub clean_shell_history: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shred_passes: default_passes(),
            log_level: default_log_level(),
            log_file: default_log_file(),
            clean_thumbnails: true,
            clean_recent_files: true,
            clean_trash: true,
            clean_shell_history: false,
        }
    }
}

impl Config {
    /// Configuration for maximum destruction coverage: more passes and
    /// every sweep location enabled, including shell history.
    pub fn paranoid() -> Self {
        Self {
            shred_passes: PARANOID_SHRED_PASSES,
            clean_shell_history: true,
            ..Default::default()
        }
    }

    /// Default on-disk location: `~/.config/trackshred/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("trackshred").join("config.json"))
    }

    /// Loads configuration.
    ///
    /// With an explicit `path`, a missing or malformed file is an
    /// `InvalidInput` error (the user asked for that exact file). With
    /// no path, the default location is tried; a missing file yields
    /// defaults and a malformed one is logged and ignored, matching the
    /// tolerance expected of an optional dotfile.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(explicit) => {
                let raw = std::fs::read_to_string(explicit)
                    .map_err(|e| ShredError::classify_io(explicit, e))?;
                serde_json::from_str(&raw).map_err(|e| {
                    ShredError::InvalidInput(format!(
                        "malformed config {}: {}",
                        explicit.display(),
                        e
                    ))
                })
            }
            None => {
                let Some(default) = Self::default_path() else {
                    return Ok(Self::default());
                };
                match std::fs::read_to_string(&default) {
                    Ok(raw) => Ok(serde_json::from_str(&raw).unwrap_or_else(|e| {
                        tracing::warn!(
                            path = %default.display(),
                            error = %e,
                            "ignoring malformed config file"
                        );
                        Self::default()
                    })),
                    Err(_) => Ok(Self::default()),
                }
            }
        }
    }

    /// Writes the configuration as pretty JSON, creating parent
    /// directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ShredError::classify_io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ShredError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        let mut file =
            std::fs::File::create(path).map_err(|e| ShredError::classify_io(path, e))?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }

    /// Checks value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        validate_passes(self.shred_passes)
    }
}

/// Rejects pass counts outside `[1, 10]`.
pub fn validate_passes(passes: u32) -> Result<()> {
    if !(MIN_SHRED_PASSES..=MAX_SHRED_PASSES).contains(&passes) {
        return Err(ShredError::InvalidInput(format!(
            "shred passes must be between {} and {}, got {}",
            MIN_SHRED_PASSES, MAX_SHRED_PASSES, passes
        )));
    }
    Ok(())
}

/// Destruction profile resolving to a concrete [`Config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Profile {
    /// Stock defaults.
    Basic,
    /// Elevated pass count, every sweep location enabled.
    Paranoid,
    /// Explicitly supplied options (the CLI path: config file + flags).
    Custom(Config),
}

impl Profile {
    /// Resolves the profile into the configuration the engine runs with.
    pub fn resolve(&self) -> Config {
        match self {
            Profile::Basic => Config::default(),
            Profile::Paranoid => Config::paranoid(),
            Profile::Custom(config) => config.clone(),
        }
    }
}
