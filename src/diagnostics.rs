//! Diagnostics - Classified Findings and Run Statistics
//!
//! Checks produce diagnostics. The report decides pass/fail.
//! Warnings never affect the outcome.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// One classified validation finding with its location context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Diagnostic {
    pub rule: String,
    pub severity: Severity,
    pub message: String,
    #[serde(default)]
    pub component: Option<String>,
    #[serde(default)]
    pub library: Option<String>,
    #[serde(default)]
    pub source_file: Option<String>,
}

impl Diagnostic {
    pub fn error(rule: &str, message: impl Into<String>) -> Self {
        Self::new(rule, Severity::Error, message)
    }

    pub fn warning(rule: &str, message: impl Into<String>) -> Self {
        Self::new(rule, Severity::Warning, message)
    }

    fn new(rule: &str, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            rule: rule.to_string(),
            severity,
            message: message.into(),
            component: None,
            library: None,
            source_file: None,
        }
    }

    pub fn with_component(mut self, component: Option<&str>) -> Self {
        self.component = component.filter(|c| !c.is_empty()).map(str::to_string);
        self
    }

    pub fn with_library(mut self, library: Option<&str>) -> Self {
        self.library = library.filter(|l| !l.is_empty()).map(str::to_string);
        self
    }

    pub fn with_source(mut self, source_file: &str) -> Self {
        self.source_file = Some(source_file.to_string());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// "Component: X | Library: Y | File: Z", omitting missing parts.
    pub fn location(&self) -> String {
        let mut parts = vec![];
        if let Some(c) = &self.component {
            parts.push(format!("Component: {}", c));
        }
        if let Some(l) = &self.library {
            parts.push(format!("Library: {}", l));
        }
        if let Some(f) = &self.source_file {
            parts.push(format!("File: {}", f));
        }
        parts.join(" | ")
    }
}

/// Append-only accumulator threaded through one validation run.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.items.extend(diagnostics);
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.severity == Severity::Warning)
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationSummary {
    pub errors: usize,
    pub warnings: usize,
    pub passed: bool,
}

/// Summary statistics for one run over all libraries.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LibraryStats {
    pub total_libraries: usize,
    pub total_components: usize,
    pub total_base_symbols: usize,
    pub total_footprints: usize,
    pub components_by_library: BTreeMap<String, usize>,
    pub base_components_usage: BTreeMap<String, usize>,
    pub validation_summary: ValidationSummary,
}

/// Outcome of `Validator::validate_all`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub passed: bool,
    pub diagnostics: Vec<Diagnostic>,
    pub stats: LibraryStats,
    pub generated_at: DateTime<Utc>,
    /// Set when the run was aborted before every component was checked.
    #[serde(default)]
    pub aborted: bool,
}

impl ValidationReport {
    pub fn new(diagnostics: Diagnostics, mut stats: LibraryStats, aborted: bool) -> Self {
        let errors = diagnostics.error_count();
        stats.validation_summary = ValidationSummary {
            errors,
            warnings: diagnostics.warning_count(),
            passed: errors == 0,
        };
        Self {
            passed: errors == 0,
            diagnostics: diagnostics.into_vec(),
            stats,
            generated_at: Utc::now(),
            aborted,
        }
    }

    pub fn errors(&self) -> Vec<&Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error()).collect()
    }

    pub fn warnings(&self) -> Vec<&Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_error()).collect()
    }

    /// Counts, then errors, then warnings, then per-library distribution.
    pub fn render_text(&self) -> String {
        let rule = "=".repeat(60);
        let mut out = String::new();
        let s = &self.stats;

        let _ = writeln!(out, "Library Statistics:");
        let _ = writeln!(out, "  Libraries: {}", s.total_libraries);
        let _ = writeln!(out, "  Components: {}", s.total_components);
        let _ = writeln!(out, "  Base Symbols: {}", s.total_base_symbols);
        let _ = writeln!(out, "  Footprints: {}", s.total_footprints);

        let _ = writeln!(out, "\nValidation Results:");
        let _ = writeln!(out, "  Passed: {}", self.passed);
        let _ = writeln!(out, "  Errors: {}", s.validation_summary.errors);
        let _ = writeln!(out, "  Warnings: {}", s.validation_summary.warnings);
        if self.aborted {
            let _ = writeln!(out, "  (run aborted, results are partial)");
        }

        for (title, marker, items) in [
            ("ERRORS:", "x", self.errors()),
            ("WARNINGS:", "!", self.warnings()),
        ] {
            if items.is_empty() {
                continue;
            }
            let _ = writeln!(out, "\n{}\n{}\n{}", rule, title, rule);
            for d in items {
                let _ = writeln!(out, "{} {}", marker, d.message);
                let location = d.location();
                if !location.is_empty() {
                    let _ = writeln!(out, "  -> {}", location);
                }
                let _ = writeln!(out);
            }
        }

        if !s.components_by_library.is_empty() {
            let _ = writeln!(out, "\nComponents per Library:");
            for (lib, count) in &s.components_by_library {
                let _ = writeln!(out, "  {}: {}", lib, count);
            }
        }

        let _ = writeln!(out, "\n{}", rule);
        out
    }

    /// Export shape consumed by CI tooling.
    pub fn to_export_json(&self) -> serde_json::Value {
        let entry = |d: &Diagnostic| {
            serde_json::json!({
                "message": d.message,
                "component": d.component.clone().unwrap_or_default(),
                "library": d.library.clone().unwrap_or_default(),
                "file": d.source_file.clone().unwrap_or_default(),
            })
        };
        serde_json::json!({
            "timestamp": self.generated_at.to_rfc3339(),
            "statistics": self.stats,
            "validation": {
                "passed": self.passed,
                "error_count": self.stats.validation_summary.errors,
                "warning_count": self.stats.validation_summary.warnings,
            },
            "errors": self.errors().into_iter().map(entry).collect::<Vec<_>>(),
            "warnings": self.warnings().into_iter().map(entry).collect::<Vec<_>>(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_skips_missing_parts() {
        let d = Diagnostic::error("required", "Missing")
            .with_component(Some("R_10k"))
            .with_source("Resistors.yaml");
        assert_eq!(d.location(), "Component: R_10k | File: Resistors.yaml");
    }

    #[test]
    fn test_warnings_do_not_fail_report() {
        let mut diags = Diagnostics::new();
        diags.push(Diagnostic::warning("length", "long"));
        let report = ValidationReport::new(diags, LibraryStats::default(), false);
        assert!(report.passed);
        assert_eq!(report.stats.validation_summary.warnings, 1);
        assert!(report.render_text().contains("WARNINGS:"));
    }

    #[test]
    fn test_export_json_counts() {
        let mut diags = Diagnostics::new();
        diags.push(Diagnostic::error("pattern", "bad").with_library(Some("Caps")));
        diags.push(Diagnostic::warning("length", "long"));
        let report = ValidationReport::new(diags, LibraryStats::default(), false);
        let json = report.to_export_json();
        assert_eq!(json["validation"]["passed"], false);
        assert_eq!(json["validation"]["error_count"], 1);
        assert_eq!(json["errors"][0]["library"], "Caps");
        assert_eq!(json["warnings"][0]["component"], "");
    }
}
