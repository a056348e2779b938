//! Global Validation Configuration
//!
//! Every option is optional. Unset keys fall back to the built-in defaults,
//! so a partial config file only overrides what it names.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML syntax in {file}: {source}")]
    InvalidYaml {
        file: String,
        #[source]
        source: serde_yaml_ng::Error,
    },

    #[error("'components' should be a list in {file}")]
    ComponentsNotList { file: String },

    #[error("Invalid definition in {file}: {message}")]
    InvalidDefinition { file: String, message: String },

    #[error("Library name '{actual}' doesn't match filename '{expected}' in {file}")]
    LibraryNameMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    #[error("Invalid pattern '{pattern}' for '{key}' in library '{library}': {source}")]
    InvalidPattern {
        library: String,
        key: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error(
        "Conditional rule '{condition}' in library '{library}' must have the form 'field=value'"
    )]
    InvalidCondition { library: String, condition: String },
}

impl ConfigError {
    /// Definition file the error belongs to, when there is one.
    pub fn source_file(&self) -> Option<&str> {
        match self {
            ConfigError::InvalidYaml { file, .. }
            | ConfigError::ComponentsNotList { file }
            | ConfigError::InvalidDefinition { file, .. }
            | ConfigError::LibraryNameMismatch { file, .. } => Some(file),
            _ => None,
        }
    }
}

/// Minimum footprint dimensions in millimetres.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DimensionLimits {
    #[serde(default = "default_min_drill")]
    pub min_drill_diameter: f64,
    #[serde(default = "default_min_via_size")]
    pub min_via_size: f64,
    #[serde(default = "default_min_via_drill")]
    pub min_via_drill: f64,
    #[serde(default = "default_min_pad_size")]
    pub min_pad_size: f64,
    #[serde(default = "default_true")]
    pub thermal_via_warning_only: bool,
}

fn default_min_drill() -> f64 { 0.3 }
fn default_min_via_size() -> f64 { 0.3 }
fn default_min_via_drill() -> f64 { 0.3 }
fn default_min_pad_size() -> f64 { 0.6 }
fn default_true() -> bool { true }

impl Default for DimensionLimits {
    fn default() -> Self {
        Self {
            min_drill_diameter: default_min_drill(),
            min_via_size: default_min_via_size(),
            min_via_drill: default_min_via_drill(),
            min_pad_size: default_min_pad_size(),
            thermal_via_warning_only: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GlobalConfig {
    #[serde(default = "default_required")]
    pub required_properties: Vec<String>,
    #[serde(default = "default_required")]
    pub non_empty_properties: Vec<String>,
    #[serde(default = "default_patterns")]
    pub property_patterns: IndexMap<String, String>,
    #[serde(default = "default_max_length")]
    pub max_property_length: usize,
    #[serde(default = "default_manufacturer")]
    pub manufacturer_properties: Vec<String>,
    #[serde(default)]
    pub footprint_dimensions: DimensionLimits,
}

pub const DEFAULT_MAX_PROPERTY_LENGTH: usize = 200;

fn default_required() -> Vec<String> {
    vec!["Footprint".to_string(), "ki_description".to_string()]
}

fn default_patterns() -> IndexMap<String, String> {
    IndexMap::from([
        ("Footprint".to_string(), "^7Sigma:".to_string()),
        ("LCSC Part".to_string(), r"^C\d+$".to_string()),
    ])
}

fn default_max_length() -> usize { DEFAULT_MAX_PROPERTY_LENGTH }

fn default_manufacturer() -> Vec<String> {
    ["Manufacturer 1", "Manufacturer Part Number 1", "Supplier 1", "Supplier Part Number 1"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            required_properties: default_required(),
            non_empty_properties: default_required(),
            property_patterns: default_patterns(),
            max_property_length: default_max_length(),
            manufacturer_properties: default_manufacturer(),
            footprint_dimensions: DimensionLimits::default(),
        }
    }
}

impl GlobalConfig {
    /// Load from a YAML file. A missing or empty file yields the defaults;
    /// a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content, &path.display().to_string())
    }

    pub fn from_yaml_str(content: &str, file: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml_ng::from_str(content).map_err(|source| ConfigError::InvalidYaml {
            file: file.to_string(),
            source,
        })
    }
}
