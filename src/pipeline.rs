//! Generation Pipeline - Definitions to Derived Symbol Libraries
//!
//! A failing component never aborts its library, and a failing library never
//! aborts the run. Failures are collected and returned with the output.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::config::ConfigError;
use crate::definitions::{DefinitionSet, LibraryDefinition};
use crate::merge::merge_component;
use crate::templates::{SymbolLibraryFile, SymbolTemplate, TemplateRegistry};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ComponentFailure {
    pub library: String,
    pub component: String,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct GeneratedLibrary {
    pub name: String,
    pub source_file: String,
    pub symbols: Vec<SymbolTemplate>,
    pub failures: Vec<ComponentFailure>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerationSummary {
    pub libraries_written: usize,
    pub components_generated: usize,
    pub failures: Vec<ComponentFailure>,
    /// Libraries (or files) that could not be generated at all.
    pub skipped: Vec<String>,
}

impl GenerationSummary {
    pub fn succeeded(&self) -> bool {
        self.failures.is_empty() && self.skipped.is_empty()
    }
}

/// Destination for generated libraries.
pub trait LibraryWriter {
    fn write_library(&mut self, library: &GeneratedLibrary) -> Result<(), PipelineError>;
}

/// Collects libraries in memory.
impl LibraryWriter for Vec<GeneratedLibrary> {
    fn write_library(&mut self, library: &GeneratedLibrary) -> Result<(), PipelineError> {
        self.push(library.clone());
        Ok(())
    }
}

/// Writes `<library>.yaml` into a directory, in the template-set file shape.
pub struct YamlLibraryWriter {
    dir: PathBuf,
}

impl YamlLibraryWriter {
    pub fn new(dir: &Path) -> Self {
        Self { dir: dir.to_path_buf() }
    }
}

impl LibraryWriter for YamlLibraryWriter {
    fn write_library(&mut self, library: &GeneratedLibrary) -> Result<(), PipelineError> {
        fs::create_dir_all(&self.dir).map_err(|source| PipelineError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.dir.join(format!("{}.yaml", library.name));
        let file = SymbolLibraryFile { symbols: library.symbols.clone() };
        let content = serde_yaml_ng::to_string(&file)?;
        fs::write(&path, content).map_err(|source| PipelineError::Io { path, source })
    }
}

/// The generation pipeline - one entry point from definitions to written libraries
pub struct GenerationPipeline {
    registry: TemplateRegistry,
}

impl GenerationPipeline {
    pub fn new(registry: TemplateRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    /// Merge every component of one library.
    ///
    /// Only a library whose name disagrees with its file is rejected outright.
    pub fn generate_library(
        &self,
        library: &LibraryDefinition,
    ) -> Result<GeneratedLibrary, ConfigError> {
        let name = library.library_name.clone().unwrap_or_default();
        if name != library.source_stem() {
            return Err(ConfigError::LibraryNameMismatch {
                file: library.source_file.clone(),
                expected: library.source_stem().to_string(),
                actual: name,
            });
        }

        let mut symbols = vec![];
        let mut failures = vec![];
        for component in library.components() {
            match merge_component(&self.registry, component) {
                Ok(symbol) => symbols.push(symbol),
                Err(e) => {
                    tracing::warn!(
                        library = %name,
                        component = component.display_name(),
                        error = %e,
                        "component not generated"
                    );
                    failures.push(ComponentFailure {
                        library: name.clone(),
                        component: component.display_name().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(GeneratedLibrary {
            name,
            source_file: library.source_file.clone(),
            symbols,
            failures,
        })
    }

    /// Generate and write every library. Only writer failures abort the run.
    pub fn generate_all(
        &self,
        definitions: &DefinitionSet,
        writer: &mut dyn LibraryWriter,
    ) -> Result<GenerationSummary, PipelineError> {
        let mut summary = GenerationSummary::default();
        summary
            .skipped
            .extend(definitions.failures.iter().map(|e| e.to_string()));

        for library in &definitions.libraries {
            let generated = match self.generate_library(library) {
                Ok(generated) => generated,
                Err(e) => {
                    tracing::warn!(file = %library.source_file, error = %e, "library skipped");
                    summary.skipped.push(e.to_string());
                    continue;
                }
            };
            writer.write_library(&generated)?;
            summary.libraries_written += 1;
            summary.components_generated += generated.symbols.len();
            summary.failures.extend(generated.failures);
        }

        tracing::info!(
            libraries = summary.libraries_written,
            components = summary.components_generated,
            failures = summary.failures.len(),
            "generation finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::{ComponentDefinition, FieldOverride};
    use crate::merge::WorkingField;

    fn pipeline() -> GenerationPipeline {
        let mut registry = TemplateRegistry::new();
        registry.register(SymbolTemplate::new(
            "R_Base",
            vec![WorkingField::new("Reference", "R"), WorkingField::new("Value", "R")],
        ));
        GenerationPipeline::new(registry)
    }

    fn library(file: &str, components: Vec<ComponentDefinition>) -> LibraryDefinition {
        LibraryDefinition {
            library_name: Some("Resistors".into()),
            components: Some(components),
            validation_rules: None,
            source_file: file.into(),
        }
    }

    fn resistor(name: &str, base: &str) -> ComponentDefinition {
        ComponentDefinition {
            name: name.into(),
            base_component: Some(base.into()),
            properties: vec![FieldOverride::new("Value", "10k")],
            remove_properties: vec![],
        }
    }

    #[test]
    fn test_failures_do_not_abort_library() {
        let lib = library(
            "Resistors.yaml",
            vec![resistor("R1", "R_Base"), resistor("R2", "Nope"), resistor("R3", "R_Base")],
        );
        let generated = pipeline().generate_library(&lib).unwrap();
        assert_eq!(generated.symbols.len(), 2);
        assert_eq!(generated.symbols[1].name, "R3");
        assert_eq!(generated.symbols[1].units[0].name, "R3");
        assert_eq!(generated.failures.len(), 1);
        assert_eq!(generated.failures[0].component, "R2");
    }

    #[test]
    fn test_name_mismatch_skips_library() {
        let defs = DefinitionSet::new(vec![
            library("Other.yaml", vec![resistor("R1", "R_Base")]),
            library("Resistors.yaml", vec![resistor("R2", "R_Base")]),
        ]);
        let mut written: Vec<GeneratedLibrary> = vec![];
        let summary = pipeline().generate_all(&defs, &mut written).unwrap();
        assert_eq!(summary.libraries_written, 1);
        assert_eq!(summary.skipped.len(), 1);
        assert!(!summary.succeeded());
        assert_eq!(written[0].symbols[0].name, "R2");
    }

    #[test]
    fn test_yaml_writer_output_loads_as_template_set() {
        let dir = tempfile::tempdir().unwrap();
        let defs = DefinitionSet::new(vec![library(
            "Resistors.yaml",
            vec![resistor("R_10k", "R_Base")],
        )]);
        let mut writer = YamlLibraryWriter::new(dir.path());
        let summary = pipeline().generate_all(&defs, &mut writer).unwrap();
        assert!(summary.succeeded());

        let reloaded =
            TemplateRegistry::load_from_file(&dir.path().join("Resistors.yaml")).unwrap();
        assert_eq!(reloaded.get("R_10k").unwrap().field("Value").unwrap().value, "10k");
    }
}
