//! Template System - Base Symbols Derived Components Copy

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::merge::WorkingField;

pub type TemplateId = String;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Failed to read template set {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid template set {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SymbolUnit {
    pub name: String,
    #[serde(default)]
    pub unit_id: u32,
    #[serde(default = "default_style")]
    pub style_id: u32,
}

fn default_style() -> u32 { 1 }

/// A named symbol: its ordered fields plus structural metadata the engine
/// carries along without interpreting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SymbolTemplate {
    pub name: TemplateId,
    #[serde(default)]
    pub units: Vec<SymbolUnit>,
    #[serde(default)]
    pub fields: Vec<WorkingField>,
}

impl SymbolTemplate {
    pub fn new(name: impl Into<String>, fields: Vec<WorkingField>) -> Self {
        let name = name.into();
        Self {
            units: vec![SymbolUnit { name: name.clone(), unit_id: 0, style_id: 1 }],
            name,
            fields,
        }
    }

    /// Deep copy under a new name, units renamed to match.
    pub fn derive(&self, name: &str) -> SymbolTemplate {
        let mut copy = self.clone();
        copy.name = name.to_string();
        for unit in &mut copy.units {
            unit.name = name.to_string();
        }
        copy
    }

    pub fn field(&self, key: &str) -> Option<&WorkingField> {
        self.fields.iter().find(|f| f.key == key)
    }
}

/// On-disk shape of a template set and of a generated library.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SymbolLibraryFile {
    #[serde(default)]
    pub symbols: Vec<SymbolTemplate>,
}

/// Template registry - base symbols by name, in load order
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: IndexMap<TemplateId, SymbolTemplate>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self { templates: IndexMap::new() }
    }

    /// Load a template set from YAML, or JSON when the extension says so.
    pub fn load_from_file(path: &Path) -> Result<Self, RegistryError> {
        let content = fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let parse_err = |message: String| RegistryError::Parse {
            path: path.to_path_buf(),
            message,
        };

        let file: SymbolLibraryFile = if path.extension().map_or(false, |e| e == "json") {
            serde_json::from_str(&content).map_err(|e| parse_err(e.to_string()))?
        } else {
            serde_yaml_ng::from_str(&content).map_err(|e| parse_err(e.to_string()))?
        };

        let mut registry = Self::new();
        for symbol in file.symbols {
            registry.register(symbol);
        }
        tracing::debug!(path = %path.display(), templates = registry.len(), "loaded template set");
        Ok(registry)
    }

    pub fn get(&self, id: &str) -> Option<&SymbolTemplate> {
        self.templates.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.templates.contains_key(id)
    }

    pub fn list(&self) -> Vec<&SymbolTemplate> {
        self.templates.values().collect()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn register(&mut self, template: SymbolTemplate) {
        self.templates.insert(template.name.clone(), template);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_renames_units() {
        let mut base = SymbolTemplate::new("R_Base", vec![WorkingField::new("Value", "R")]);
        base.units.push(SymbolUnit { name: "R_Base".into(), unit_id: 1, style_id: 1 });

        let derived = base.derive("R_10k");
        assert_eq!(derived.name, "R_10k");
        assert!(derived.units.iter().all(|u| u.name == "R_10k"));
        assert_eq!(derived.units[1].unit_id, 1);
        assert_eq!(base.units[0].name, "R_Base");
    }

    #[test]
    fn test_load_yaml_template_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("base_library.yaml");
        fs::write(
            &path,
            r#"
symbols:
  - name: R_Base
    fields:
      - key: Value
        value: R
  - name: C_Base
"#,
        )
        .unwrap();

        let registry = TemplateRegistry::load_from_file(&path).unwrap();
        let names: Vec<_> = registry.list().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["R_Base", "C_Base"]);
        assert_eq!(registry.get("R_Base").unwrap().field("Value").unwrap().value, "R");
        assert!(registry.get("C_Base").unwrap().fields.is_empty());
    }

    #[test]
    fn test_load_missing_file() {
        let err =
            TemplateRegistry::load_from_file(Path::new("/nonexistent/base.yaml")).unwrap_err();
        assert!(matches!(err, RegistryError::Io { .. }));
    }
}
