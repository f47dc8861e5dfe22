// src/config.rs

use anyhow::Result;
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::debug;

use crate::error::TableError;

/// Rows per Arrow CSV read batch when nothing else is configured.
pub const DEFAULT_BATCH_SIZE: usize = 8192;

/// How fields are separated in the input files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delimiter {
    #[default]
    Comma,
    /// Any run of spaces/tabs separates two fields.
    Whitespace,
}

impl Delimiter {
    pub fn from_whitespace_flag(delim_whitespace: bool) -> Self {
        if delim_whitespace {
            Delimiter::Whitespace
        } else {
            Delimiter::Comma
        }
    }
}

/// Knobs for the loader.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    pub delimiter: Delimiter,
    pub batch_size: usize,
    /// Rows sampled for type inference; `None` scans the whole file.
    pub infer_records: Option<usize>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            delimiter: Delimiter::Comma,
            batch_size: DEFAULT_BATCH_SIZE,
            infer_records: None,
        }
    }
}

impl ImportOptions {
    pub fn with_delimiter(mut self, delimiter: Delimiter) -> Self {
        self.delimiter = delimiter;
        self
    }
}

/// Input list plus loader options, as read from a YAML file:
///
/// ```yaml
/// delimiter: whitespace
/// files:
///   - out/basin.daily
///   - out/patch.daily
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ImportConfig {
    #[serde(default)]
    pub files: Vec<PathBuf>,
    #[serde(flatten)]
    pub options: ImportOptions,
}

impl ImportConfig {
    pub fn from_yaml_str(yaml: &str, origin: &Path) -> Result<Self> {
        let cfg: ImportConfig =
            serde_yaml::from_str(yaml).map_err(|source| TableError::Config {
                path: origin.to_path_buf(),
                source,
            })?;
        debug!(files = cfg.files.len(), options = ?cfg.options, "parsed config");
        Ok(cfg)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let yaml = fs::read_to_string(path).map_err(|source| TableError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&yaml, path)
    }
}
