//! SymForge Core - Symbol Library Compiler
//!
//! # The Rules of the Engine
//! 1. Definitions Are Read-Only
//! 2. Overrides Apply In Order
//! 3. Templates Substitute, Never Evaluate
//! 4. Checks Diagnose, Never Throw
//! 5. Errors Fail The Run, Warnings Never Do

pub mod config;
pub mod definitions;
pub mod diagnostics;
pub mod dimensions;
pub mod footprints;
pub mod interpolate;
pub mod merge;
pub mod pipeline;
pub mod rules;
pub mod templates;
pub mod validation;

pub use config::{ConfigError, DimensionLimits, GlobalConfig};
pub use definitions::{ComponentDefinition, DefinitionSet, FieldOverride, LibraryDefinition};
pub use diagnostics::{Diagnostic, Diagnostics, LibraryStats, Severity, ValidationReport};
pub use footprints::{FootprintDirectory, FootprintSource, InMemoryFootprints};
pub use interpolate::{resolve, TemplateResolutionError};
pub use merge::{merge_component, merge_fields, MergeError, WorkingField};
pub use pipeline::{
    GenerationPipeline, GenerationSummary, LibraryWriter, PipelineError, YamlLibraryWriter,
};
pub use rules::{compose_rules, EffectiveRuleSet, RuleBlock};
pub use templates::{SymbolTemplate, TemplateId, TemplateRegistry};
pub use validation::{ComponentRule, Validator};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
