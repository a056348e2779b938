//! Footprint Dimension Scanning
//!
//! Reads drill holes, through-hole pad sizes and via size/drill pairs out of
//! raw geometry text and aggregates everything under the configured minimums
//! into one finding per category.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::config::DimensionLimits;
use crate::diagnostics::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DimensionCategory {
    Drill,
    ThroughHolePad,
    ViaSize,
    ViaDrill,
    ThermalViaSize,
    ThermalViaDrill,
}

impl DimensionCategory {
    pub fn severity(self) -> Severity {
        match self {
            DimensionCategory::ThermalViaSize | DimensionCategory::ThermalViaDrill => {
                Severity::Warning
            }
            _ => Severity::Error,
        }
    }

    fn describe(self) -> &'static str {
        match self {
            DimensionCategory::Drill => "drill hole(s) <",
            DimensionCategory::ThroughHolePad => "through-hole pad(s) <",
            DimensionCategory::ViaSize => "via(s) with size <",
            DimensionCategory::ViaDrill => "via(s) with drill <",
            DimensionCategory::ThermalViaSize => "thermal via(s) with size <",
            DimensionCategory::ThermalViaDrill => "thermal via(s) with drill <",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DimensionFinding {
    pub category: DimensionCategory,
    pub count: usize,
    pub smallest: f64,
    pub limit: f64,
}

impl DimensionFinding {
    pub fn message(&self, footprint: &str) -> String {
        format!(
            "Footprint '{}' has {} {} {}mm (smallest: {}mm)",
            footprint,
            self.count,
            self.category.describe(),
            self.limit,
            self.smallest
        )
    }
}

/// Thermal vias are recognised by their footprint's name.
pub fn is_thermal(footprint: &str) -> bool {
    footprint.contains("ThermalVias") || footprint.to_lowercase().contains("thermal")
}

struct Patterns {
    drill: Regex,
    th_pad: Regex,
    via: Regex,
    /// A whole `(via ...)` form, one level of nesting deep.
    via_form: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        drill: Regex::new(r"\(drill\s+([0-9]*\.?[0-9]+)(?:\s+[0-9]*\.?[0-9]+)?\)")
            .expect("static regex"),
        th_pad: Regex::new(concat!(
            r#"\(pad\s+"[^"]*"\s+thru_hole\s+\w+\s+\([^)]*\)\s+"#,
            r"\(size\s+([0-9]*\.?[0-9]+)(?:\s+[0-9]*\.?[0-9]+)?\)",
        ))
        .expect("static regex"),
        via: Regex::new(
            r"\(via\s+\([^)]*\)\s+\(size\s+([0-9]*\.?[0-9]+)\)\s+\(drill\s+([0-9]*\.?[0-9]+)\)",
        )
        .expect("static regex"),
        via_form: Regex::new(r"\(via\s[^()]*(?:\([^()]*\)[^()]*)*\)").expect("static regex"),
    })
}

fn parse(text: Option<regex::Match<'_>>) -> Option<f64> {
    text.and_then(|m| m.as_str().parse().ok())
}

/// Scan one footprint. Findings come back in category order, one per
/// category that has at least one violation.
pub fn scan_geometry(
    footprint: &str,
    text: &str,
    limits: &DimensionLimits,
) -> Vec<DimensionFinding> {
    let p = patterns();
    let mut below: BTreeMap<DimensionCategory, Vec<f64>> = BTreeMap::new();
    let mut record = |category, value: f64, limit: f64| {
        if value < limit {
            below.entry(category).or_default().push(value);
        }
    };

    // via drills belong to the via categories only
    let holes = p.via_form.replace_all(text, "");
    for caps in p.drill.captures_iter(&holes) {
        if let Some(drill) = parse(caps.get(1)) {
            record(DimensionCategory::Drill, drill, limits.min_drill_diameter);
        }
    }

    for caps in p.th_pad.captures_iter(text) {
        if let Some(size) = parse(caps.get(1)) {
            record(DimensionCategory::ThroughHolePad, size, limits.min_pad_size);
        }
    }

    let relaxed = is_thermal(footprint) && limits.thermal_via_warning_only;
    let (size_cat, drill_cat) = if relaxed {
        (DimensionCategory::ThermalViaSize, DimensionCategory::ThermalViaDrill)
    } else {
        (DimensionCategory::ViaSize, DimensionCategory::ViaDrill)
    };
    for caps in p.via.captures_iter(text) {
        let (Some(size), Some(drill)) = (parse(caps.get(1)), parse(caps.get(2))) else {
            continue;
        };
        record(size_cat, size, limits.min_via_size);
        record(drill_cat, drill, limits.min_via_drill);
    }

    below
        .into_iter()
        .map(|(category, values)| DimensionFinding {
            category,
            count: values.len(),
            smallest: values.iter().copied().fold(f64::INFINITY, f64::min),
            limit: match category {
                DimensionCategory::Drill => limits.min_drill_diameter,
                DimensionCategory::ThroughHolePad => limits.min_pad_size,
                DimensionCategory::ViaSize | DimensionCategory::ThermalViaSize => {
                    limits.min_via_size
                }
                DimensionCategory::ViaDrill | DimensionCategory::ThermalViaDrill => {
                    limits.min_via_drill
                }
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIAS: &str = r#"(footprint "QFN"
  (via (at 0 0) (size 0.2) (drill 0.35))
  (via (at 1 0) (size 0.25) (drill 0.35))
  (via (at 2 0) (size 0.4) (drill 0.35))
)"#;

    #[test]
    fn test_vias_aggregate_into_one_finding() {
        let findings = scan_geometry("QFN-16", VIAS, &DimensionLimits::default());
        assert_eq!(
            findings,
            vec![DimensionFinding {
                category: DimensionCategory::ViaSize,
                count: 2,
                smallest: 0.2,
                limit: 0.3,
            }]
        );
        assert_eq!(
            findings[0].message("QFN-16"),
            "Footprint 'QFN-16' has 2 via(s) with size < 0.3mm (smallest: 0.2mm)"
        );
    }

    #[test]
    fn test_thermal_vias_downgrade_when_configured() {
        let findings = scan_geometry("QFN-16_ThermalVias", VIAS, &DimensionLimits::default());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].category, DimensionCategory::ThermalViaSize);
        assert_eq!(findings[0].category.severity(), Severity::Warning);

        let strict = DimensionLimits {
            thermal_via_warning_only: false,
            ..DimensionLimits::default()
        };
        let findings = scan_geometry("QFN-16_ThermalVias", VIAS, &strict);
        assert_eq!(findings[0].category, DimensionCategory::ViaSize);
        assert_eq!(findings[0].category.severity(), Severity::Error);
    }

    #[test]
    fn test_thermal_via_drill_is_not_a_drill_hole() {
        let text = r#"(footprint "QFN"
  (via (at 0 0) (size 0.25) (drill 0.2) (layers "F.Cu" "B.Cu"))
)"#;
        let findings = scan_geometry("QFN-16_ThermalVias", text, &DimensionLimits::default());
        let categories: Vec<_> = findings.iter().map(|f| f.category).collect();
        assert_eq!(
            categories,
            vec![DimensionCategory::ThermalViaSize, DimensionCategory::ThermalViaDrill]
        );
        assert!(findings.iter().all(|f| f.category.severity() == Severity::Warning));
    }

    #[test]
    fn test_small_via_drill_reported_once() {
        let text = "(via (at 0 0) (size 0.4) (drill 0.2))";
        let findings = scan_geometry("QFN-16", text, &DimensionLimits::default());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].category, DimensionCategory::ViaDrill);
        assert_eq!(findings[0].smallest, 0.2);
    }

    #[test]
    fn test_drills_and_through_hole_pads() {
        let text = r#"
  (pad "1" thru_hole circle (at 0 0) (size 0.5 0.5) (drill 0.2) (layers "*.Cu"))
  (pad "2" thru_hole rect (at 2.54 0) (size 1.7 1.7) (drill 1.0) (layers "*.Cu"))
  (pad "3" smd rect (at 5 0) (size 0.3 0.3) (layers "F.Cu"))
"#;
        let findings = scan_geometry("PinHeader", text, &DimensionLimits::default());
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].category, DimensionCategory::Drill);
        assert_eq!(findings[0].count, 1);
        assert_eq!(findings[0].smallest, 0.2);
        assert_eq!(findings[1].category, DimensionCategory::ThroughHolePad);
        assert_eq!(findings[1].smallest, 0.5);
        assert_eq!(
            findings[1].message("PinHeader"),
            "Footprint 'PinHeader' has 1 through-hole pad(s) < 0.6mm (smallest: 0.5mm)"
        );
    }

    #[test]
    fn test_clean_footprint_has_no_findings() {
        let text = r#"(pad "1" smd rect (at 0 0) (size 0.5 0.5))"#;
        assert!(scan_geometry("R_0402", text, &DimensionLimits::default()).is_empty());
    }
}
