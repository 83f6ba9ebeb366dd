//! Build configuration
//!
//! Shaped like the routing engine's JSON config; only the tile paths under
//! `mjolnir` are read and everything else is ignored.

use std::path::{Path, PathBuf};

use butterfly_common::{Error, IoResultExt, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub mjolnir: MjolnirConfig,
}

/// Tile locations
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MjolnirConfig {
    /// Directory of loose `.gph` tiles
    pub tile_dir: Option<PathBuf>,
    /// Tile extract: the output when packing a directory, the source otherwise
    pub tile_extract: Option<PathBuf>,
    pub traffic_extract: Option<PathBuf>,
}

/// Command-line values that take precedence over the file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub tile_dir: Option<PathBuf>,
    pub tile_extract: Option<PathBuf>,
    pub traffic_extract: Option<PathBuf>,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).with_path(path)?;
        Self::from_json(&text)
            .map_err(|e| Error::validation(format!("config {}: {e}", path.display())))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::validation(format!("bad config JSON: {e}")))
    }

    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        let mjolnir = &mut self.mjolnir;
        if overrides.tile_dir.is_some() {
            mjolnir.tile_dir = overrides.tile_dir;
        }
        if overrides.tile_extract.is_some() {
            mjolnir.tile_extract = overrides.tile_extract;
        }
        if overrides.traffic_extract.is_some() {
            mjolnir.traffic_extract = overrides.traffic_extract;
        }
        self
    }
}
