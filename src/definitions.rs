//! Component Definitions - Declarative Library Sources
//!
//! One YAML file per library. Each component names a base template and
//! lists the field overrides that turn it into a derived symbol.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::config::ConfigError;
use crate::rules::RuleBlock;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Position {
    #[serde(rename = "X", default)]
    pub x: f64,
    #[serde(rename = "Y", default)]
    pub y: f64,
    #[serde(default)]
    pub angle: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Font {
    #[serde(default)]
    pub face: Option<String>,
    #[serde(default = "default_text_size")]
    pub height: f64,
    #[serde(default = "default_text_size")]
    pub width: f64,
    #[serde(default)]
    pub thickness: Option<f64>,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
}

fn default_text_size() -> f64 { 1.27 }

impl Default for Font {
    fn default() -> Self {
        Self {
            face: None,
            height: default_text_size(),
            width: default_text_size(),
            thickness: None,
            bold: false,
            italic: false,
        }
    }
}

/// Display effects of a field attached to a symbol.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Effects {
    #[serde(default)]
    pub font: Font,
    #[serde(default)]
    pub hide: bool,
}

/// Effects as written in an override: only what is named gets applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EffectsOverride {
    #[serde(default)]
    pub font: Option<Font>,
    #[serde(default)]
    pub hide: Option<bool>,
}

/// Instruction to set or add one named field.
///
/// `value: None` covers both an explicit `null` and an omitted value and
/// means "intentionally not applicable".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FieldOverride {
    pub key: String,
    #[serde(default, deserialize_with = "scalar_as_text")]
    pub value: Option<String>,
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default)]
    pub effects: Option<EffectsOverride>,
    #[serde(default, rename = "showName")]
    pub show_name: Option<bool>,
}

impl FieldOverride {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn null(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Bool(bool),
    Number(serde_yaml_ng::Number),
    Text(String),
}

/// YAML writes `value: 10` as often as `value: "10"`; both mean the same text.
/// Floats keep their fractional part, so `50.0` stays `"50.0"`.
fn scalar_as_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let scalar = Option::<Scalar>::deserialize(deserializer)?;
    Ok(scalar.map(|s| match s {
        Scalar::Bool(b) => b.to_string(),
        Scalar::Number(n) => n.to_string(),
        Scalar::Text(t) => t,
    }))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ComponentDefinition {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub base_component: Option<String>,
    #[serde(default)]
    pub properties: Vec<FieldOverride>,
    #[serde(default)]
    pub remove_properties: Vec<String>,
}

impl ComponentDefinition {
    /// Whether the key is declared at all, null or not.
    pub fn has_property(&self, key: &str) -> bool {
        self.properties.iter().any(|p| p.key == key)
    }

    /// Value of the first declaration of `key`; `None` when absent or null.
    pub fn property_value(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|p| p.key == key)
            .and_then(|p| p.value.as_deref())
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() { "unnamed" } else { &self.name }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibraryDefinition {
    #[serde(default)]
    pub library_name: Option<String>,
    #[serde(default)]
    pub components: Option<Vec<ComponentDefinition>>,
    #[serde(default)]
    pub validation_rules: Option<RuleBlock>,
    /// File name the library was loaded from, e.g. `Resistors.yaml`.
    #[serde(skip)]
    pub source_file: String,
}

impl LibraryDefinition {
    pub fn name(&self) -> &str {
        self.library_name.as_deref().unwrap_or("unknown")
    }

    pub fn components(&self) -> &[ComponentDefinition] {
        self.components.as_deref().unwrap_or(&[])
    }

    /// Source file name without its extension.
    pub fn source_stem(&self) -> &str {
        Path::new(&self.source_file)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.source_file)
    }

    /// Parse one definition file. Structure beyond "is a list" is left to validation.
    pub fn from_yaml_str(content: &str, source_file: &str) -> Result<Self, ConfigError> {
        let value: serde_yaml_ng::Value =
            serde_yaml_ng::from_str(content).map_err(|source| ConfigError::InvalidYaml {
                file: source_file.to_string(),
                source,
            })?;

        if let Some(components) = value.get("components") {
            if !components.is_sequence() {
                return Err(ConfigError::ComponentsNotList {
                    file: source_file.to_string(),
                });
            }
        }

        let mut library: LibraryDefinition =
            serde_yaml_ng::from_value(value).map_err(|e| ConfigError::InvalidDefinition {
                file: source_file.to_string(),
                message: e.to_string(),
            })?;
        library.source_file = source_file.to_string();
        Ok(library)
    }
}

/// All definitions of one run, plus the files that could not be loaded.
#[derive(Debug, Default)]
pub struct DefinitionSet {
    pub libraries: Vec<LibraryDefinition>,
    pub failures: Vec<ConfigError>,
}

impl DefinitionSet {
    pub fn new(libraries: Vec<LibraryDefinition>) -> Self {
        Self { libraries, failures: vec![] }
    }

    /// Load every `*.yaml` / `*.yml` file in `dir`, in file-name order.
    ///
    /// A broken file is recorded in `failures` and does not stop the others.
    pub fn load_from_dir(dir: &Path) -> Result<Self, ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut paths = vec![];
        for entry in fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.extension().map_or(false, |e| e == "yaml" || e == "yml") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut set = Self::default();
        for path in paths {
            let file = path
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_default();
            let loaded = fs::read_to_string(&path)
                .map_err(|source| ConfigError::Io { path: path.clone(), source })
                .and_then(|content| LibraryDefinition::from_yaml_str(&content, &file));
            match loaded {
                Ok(library) => {
                    tracing::debug!(
                        file = %file,
                        components = library.components().len(),
                        "loaded library"
                    );
                    set.libraries.push(library);
                }
                Err(e) => {
                    tracing::warn!(file = %file, error = %e, "skipping definition file");
                    set.failures.push(e);
                }
            }
        }
        Ok(set)
    }

    pub fn components(&self) -> impl Iterator<Item = (&LibraryDefinition, &ComponentDefinition)> {
        self.libraries
            .iter()
            .flat_map(|lib| lib.components().iter().map(move |c| (lib, c)))
    }
}
