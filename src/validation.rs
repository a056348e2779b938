//! Validation Engine - Independent Checks, Collected Diagnostics
//!
//! Rules produce diagnostics. They never fail and never see each other's output.
//! The report decides pass/fail from the error count alone.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::GlobalConfig;
use crate::definitions::{ComponentDefinition, DefinitionSet, LibraryDefinition};
use crate::diagnostics::{Diagnostic, Diagnostics, LibraryStats, Severity, ValidationReport};
use crate::dimensions::scan_geometry;
use crate::footprints::{FootprintSource, FOOTPRINT_EXTENSION, FOOTPRINT_PREFIX};
use crate::interpolate::referenced_identifiers;
use crate::rules::{compose_rules, EffectiveRuleSet};
use crate::templates::TemplateRegistry;

/// Everything a component rule may consult.
pub struct ComponentContext<'a> {
    pub library: &'a LibraryDefinition,
    pub component: &'a ComponentDefinition,
    pub rules: &'a EffectiveRuleSet,
    pub templates: &'a TemplateRegistry,
    pub footprints: &'a dyn FootprintSource,
    pub config: &'a GlobalConfig,
}

impl<'a> ComponentContext<'a> {
    fn locate(&self, diagnostic: Diagnostic) -> Diagnostic {
        diagnostic
            .with_component(Some(self.component.display_name()))
            .with_library(Some(self.library.name()))
            .with_source(&self.library.source_file)
    }

    pub fn error(&self, rule: &str, message: impl Into<String>) -> Diagnostic {
        self.locate(Diagnostic::error(rule, message))
    }

    pub fn warning(&self, rule: &str, message: impl Into<String>) -> Diagnostic {
        self.locate(Diagnostic::warning(rule, message))
    }

    /// Footprint name behind a managed `Footprint` value, when the library requires footprints.
    fn managed_footprint(&self) -> Option<&'a str> {
        if !self.rules.footprint_required {
            return None;
        }
        self.component
            .property_value("Footprint")
            .and_then(|v| v.strip_prefix(FOOTPRINT_PREFIX))
    }
}

/// Validation rule trait - produces diagnostics for one component
pub trait ComponentRule {
    fn name(&self) -> &'static str;
    fn check(&self, ctx: &ComponentContext<'_>) -> Vec<Diagnostic>;
}

// --- Library-level passes ---

/// Library name must equal its file stem; `components` must exist.
pub fn check_structure(library: &LibraryDefinition) -> Vec<Diagnostic> {
    let mut out = vec![];
    let expected = library.source_stem();
    let actual = library.library_name.as_deref().unwrap_or("");
    if actual != expected {
        out.push(
            Diagnostic::error(
                "structure",
                format!("Library name '{}' doesn't match filename '{}'", actual, expected),
            )
            .with_source(&library.source_file),
        );
    }
    if library.components.is_none() {
        out.push(
            Diagnostic::error("structure", "Missing 'components' key")
                .with_source(&library.source_file),
        );
    }
    out
}

/// Global component-name uniqueness across every library of a run.
#[derive(Debug, Default)]
pub struct UniquenessTracker {
    first_seen: HashMap<String, String>,
}

impl UniquenessTracker {
    pub fn observe(
        &mut self,
        library: &LibraryDefinition,
        component: &ComponentDefinition,
    ) -> Option<Diagnostic> {
        let located = |d: Diagnostic| {
            d.with_library(Some(library.name()))
                .with_source(&library.source_file)
        };

        if component.name.is_empty() {
            return Some(located(Diagnostic::error("uniqueness", "Missing 'name' field")));
        }
        match self.first_seen.get(&component.name) {
            Some(first) => Some(
                located(Diagnostic::error(
                    "uniqueness",
                    format!(
                        "Duplicate component name '{}' in {} (first defined in {})",
                        component.name, library.source_file, first
                    ),
                ))
                .with_component(Some(&component.name)),
            ),
            None => {
                self.first_seen
                    .insert(component.name.clone(), library.source_file.clone());
                None
            }
        }
    }
}

// --- Concrete Rules ---

pub struct BaseReferenceRule;

impl ComponentRule for BaseReferenceRule {
    fn name(&self) -> &'static str { "base_component" }

    fn check(&self, ctx: &ComponentContext<'_>) -> Vec<Diagnostic> {
        match ctx.component.base_component.as_deref() {
            None | Some("") => vec![ctx.error(self.name(), "Missing 'base_component' field")],
            Some(base) if !ctx.templates.contains(base) => vec![ctx.error(
                self.name(),
                format!("Base component '{}' not found in base library", base),
            )],
            Some(_) => vec![],
        }
    }
}

/// Presence, not value: null satisfies a requirement.
pub struct RequiredFieldsRule;

impl ComponentRule for RequiredFieldsRule {
    fn name(&self) -> &'static str { "required_properties" }

    fn check(&self, ctx: &ComponentContext<'_>) -> Vec<Diagnostic> {
        ctx.rules
            .required_properties
            .iter()
            .filter(|key| !ctx.component.has_property(key))
            .map(|key| {
                ctx.error(
                    self.name(),
                    format!("Missing required property '{}' (use null if not applicable)", key),
                )
            })
            .collect()
    }
}

pub struct ConditionalRequiredRule;

impl ComponentRule for ConditionalRequiredRule {
    fn name(&self) -> &'static str { "conditional_required_properties" }

    fn check(&self, ctx: &ComponentContext<'_>) -> Vec<Diagnostic> {
        ctx.rules
            .conditional_rules
            .iter()
            .filter(|rule| rule.applies_to(ctx.component))
            .flat_map(|rule| rule.requirements.iter())
            .filter(|key| !ctx.component.has_property(key))
            .map(|key| {
                ctx.error(
                    self.name(),
                    format!("Missing required property '{}' for conditional rule", key),
                )
            })
            .collect()
    }
}

/// Null is "not applicable" and skipped; blank text is an error.
pub struct NonEmptyRule;

impl ComponentRule for NonEmptyRule {
    fn name(&self) -> &'static str { "non_empty_properties" }

    fn check(&self, ctx: &ComponentContext<'_>) -> Vec<Diagnostic> {
        ctx.rules
            .non_empty_properties
            .iter()
            .filter(|key| {
                ctx.component
                    .property_value(key)
                    .map_or(false, |v| v.trim().is_empty())
            })
            .map(|key| {
                ctx.error(
                    self.name(),
                    format!("Property '{}' is empty (use null to skip validation)", key),
                )
            })
            .collect()
    }
}

pub struct PatternRule;

impl ComponentRule for PatternRule {
    fn name(&self) -> &'static str { "property_patterns" }

    fn check(&self, ctx: &ComponentContext<'_>) -> Vec<Diagnostic> {
        let mut out = vec![];
        for p in &ctx.rules.property_patterns {
            let Some(value) = ctx.component.property_value(&p.key).filter(|v| !v.is_empty()) else {
                continue;
            };
            if !p.pattern.matches(value) {
                out.push(ctx.error(
                    self.name(),
                    format!(
                        "Property '{}' value '{}' doesn't match pattern '{}'",
                        p.key,
                        value,
                        p.pattern.as_str()
                    ),
                ));
            }
        }
        out
    }
}

/// Over-long values only ever warn.
pub struct LengthRule;

impl ComponentRule for LengthRule {
    fn name(&self) -> &'static str { "max_property_length" }

    fn check(&self, ctx: &ComponentContext<'_>) -> Vec<Diagnostic> {
        let max = ctx.rules.max_property_length;
        ctx.component
            .properties
            .iter()
            .filter_map(|p| {
                let len = p.value.as_deref()?.chars().count();
                (len > max).then(|| {
                    ctx.warning(
                        self.name(),
                        format!("Property '{}' value is very long ({} chars)", p.key, len),
                    )
                })
            })
            .collect()
    }
}

/// Warns only when none of the manufacturer keys is declared at all.
pub struct ManufacturerRule;

impl ComponentRule for ManufacturerRule {
    fn name(&self) -> &'static str { "manufacturer_properties" }

    fn check(&self, ctx: &ComponentContext<'_>) -> Vec<Diagnostic> {
        let keys = &ctx.rules.manufacturer_properties;
        if keys.is_empty() || keys.iter().any(|k| ctx.component.has_property(k)) {
            return vec![];
        }
        vec![ctx.warning(self.name(), "No manufacturer information found")]
    }
}

pub struct FootprintExistsRule;

impl ComponentRule for FootprintExistsRule {
    fn name(&self) -> &'static str { "footprint" }

    fn check(&self, ctx: &ComponentContext<'_>) -> Vec<Diagnostic> {
        match ctx.managed_footprint() {
            Some(name) if !ctx.footprints.contains(name) => vec![ctx.error(
                self.name(),
                format!("Footprint file '{}.{}' not found", name, FOOTPRINT_EXTENSION),
            )],
            _ => vec![],
        }
    }
}

pub struct FootprintDimensionsRule;

impl ComponentRule for FootprintDimensionsRule {
    fn name(&self) -> &'static str { "footprint_dimensions" }

    fn check(&self, ctx: &ComponentContext<'_>) -> Vec<Diagnostic> {
        // unknown footprints are reported by FootprintExistsRule
        let Some(name) = ctx.managed_footprint().filter(|n| ctx.footprints.contains(n)) else {
            return vec![];
        };

        let text = match ctx.footprints.geometry_text(name) {
            Ok(text) => text,
            Err(e) => {
                return vec![ctx.warning(
                    self.name(),
                    format!("Could not validate footprint dimensions for '{}': {}", name, e),
                )]
            }
        };

        scan_geometry(name, &text, &ctx.config.footprint_dimensions)
            .into_iter()
            .map(|finding| {
                let message = finding.message(name);
                match finding.category.severity() {
                    Severity::Error => ctx.error(self.name(), message),
                    Severity::Warning => ctx.warning(self.name(), message),
                }
            })
            .collect()
    }
}

/// Every `{identifier}` must name a field the component itself declares.
pub struct TemplateVariablesRule;

impl ComponentRule for TemplateVariablesRule {
    fn name(&self) -> &'static str { "template_variables" }

    fn check(&self, ctx: &ComponentContext<'_>) -> Vec<Diagnostic> {
        let mut out = vec![];
        for prop in &ctx.component.properties {
            let Some(value) = prop.value.as_deref() else { continue };
            for var in referenced_identifiers(value) {
                if !ctx.component.has_property(var) {
                    out.push(ctx.error(
                        self.name(),
                        format!(
                            "Template variable '{}' in '{}' not found in component properties",
                            var, prop.key
                        ),
                    ));
                }
            }
        }
        out
    }
}

/// Validator orchestrates rules over every library and component
pub struct Validator {
    rules: Vec<Box<dyn ComponentRule>>,
}

impl Validator {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(BaseReferenceRule),
                Box::new(RequiredFieldsRule),
                Box::new(ConditionalRequiredRule),
                Box::new(NonEmptyRule),
                Box::new(PatternRule),
                Box::new(LengthRule),
                Box::new(ManufacturerRule),
                Box::new(FootprintExistsRule),
                Box::new(FootprintDimensionsRule),
                Box::new(TemplateVariablesRule),
            ],
        }
    }

    /// Check every component of every library.
    pub fn validate_all(
        &self,
        definitions: &DefinitionSet,
        templates: &TemplateRegistry,
        footprints: &dyn FootprintSource,
        config: &GlobalConfig,
    ) -> ValidationReport {
        let never = AtomicBool::new(false);
        self.validate_all_until(definitions, templates, footprints, config, &never)
    }

    /// Like [`validate_all`](Self::validate_all), stopping once `cancel` is set.
    /// The component being checked when it flips still completes.
    pub fn validate_all_until(
        &self,
        definitions: &DefinitionSet,
        templates: &TemplateRegistry,
        footprints: &dyn FootprintSource,
        config: &GlobalConfig,
        cancel: &AtomicBool,
    ) -> ValidationReport {
        let mut diagnostics = Diagnostics::new();
        let mut names = UniquenessTracker::default();
        let mut aborted = false;

        for failure in &definitions.failures {
            let d = Diagnostic::error("load", failure.to_string());
            diagnostics.push(match failure.source_file() {
                Some(file) => d.with_source(file),
                None => d,
            });
        }

        'libraries: for library in &definitions.libraries {
            diagnostics.extend(check_structure(library));

            let block = library.validation_rules.as_ref();
            let rules = match compose_rules(config, library.name(), block) {
                Ok(rules) => Some(rules),
                Err(e) => {
                    tracing::warn!(library = library.name(), error = %e, "skipping rule checks");
                    diagnostics.push(
                        Diagnostic::error("validation_rules", e.to_string())
                            .with_library(Some(library.name()))
                            .with_source(&library.source_file),
                    );
                    None
                }
            };

            for component in library.components() {
                if cancel.load(Ordering::Relaxed) {
                    aborted = true;
                    break 'libraries;
                }
                diagnostics.extend(names.observe(library, component));

                let Some(rules) = rules.as_ref() else { continue };
                let ctx = ComponentContext {
                    library,
                    component,
                    rules,
                    templates,
                    footprints,
                    config,
                };
                for rule in &self.rules {
                    diagnostics.extend(rule.check(&ctx));
                }
                tracing::debug!(
                    library = library.name(),
                    component = component.display_name(),
                    "checked"
                );
            }
        }

        let stats = collect_stats(definitions, templates, footprints);
        let report = ValidationReport::new(diagnostics, stats, aborted);
        tracing::info!(
            errors = report.stats.validation_summary.errors,
            warnings = report.stats.validation_summary.warnings,
            aborted,
            "validation finished"
        );
        report
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

pub fn collect_stats(
    definitions: &DefinitionSet,
    templates: &TemplateRegistry,
    footprints: &dyn FootprintSource,
) -> LibraryStats {
    let mut components_by_library = BTreeMap::new();
    let mut base_components_usage = BTreeMap::new();
    for library in &definitions.libraries {
        components_by_library.insert(library.name().to_string(), library.components().len());
    }
    for (_, component) in definitions.components() {
        let base = component.base_component.as_deref().unwrap_or("unknown");
        *base_components_usage.entry(base.to_string()).or_insert(0) += 1;
    }
    LibraryStats {
        total_libraries: definitions.libraries.len(),
        total_components: definitions.components().count(),
        total_base_symbols: templates.len(),
        total_footprints: footprints.available().len(),
        components_by_library,
        base_components_usage,
        validation_summary: Default::default(),
    }
}
