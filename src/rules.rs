//! Rule Composer - Global Defaults + Library Overrides
//!
//! Requirement lists are additive, pattern tables overwrite per key,
//! scalar limits replace. Conditional rules arrive in two shapes and are
//! normalized to the list form before anything downstream sees them.

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, GlobalConfig};
use crate::definitions::ComponentDefinition;

/// `validation_rules` block of a library file. Every key is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleBlock {
    #[serde(default)]
    pub required_properties: Option<Vec<String>>,
    #[serde(default)]
    pub non_empty_properties: Option<Vec<String>>,
    #[serde(default)]
    pub property_patterns: Option<IndexMap<String, String>>,
    #[serde(default)]
    pub max_property_length: Option<usize>,
    #[serde(default)]
    pub manufacturer_properties: Option<Vec<String>>,
    #[serde(default)]
    pub footprint_required: Option<bool>,
    #[serde(default)]
    pub conditional_required_properties: Option<ConditionalRules>,
}

/// Both accepted shapes of `conditional_required_properties`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionalRules {
    Canonical(Vec<ConditionalRule>),
    Legacy(LegacyConditionalRules),
}

/// Older mapping form:
///
/// ```yaml
/// base_component:
///   R_: [Power]
/// property_based:
///   "Type=SMD": [Package]
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LegacyConditionalRules {
    #[serde(default)]
    pub base_component: IndexMap<String, Vec<String>>,
    #[serde(default)]
    pub property_based: IndexMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConditionalRule {
    #[serde(default)]
    pub base_component: Option<String>,
    /// Field key -> pattern the field's value must match from its start.
    #[serde(default)]
    pub properties: IndexMap<String, String>,
    #[serde(default)]
    pub requirements: Vec<String>,
}

impl ConditionalRules {
    pub fn normalize(self, library: &str) -> Result<Vec<ConditionalRule>, ConfigError> {
        let legacy = match self {
            ConditionalRules::Canonical(rules) => return Ok(rules),
            ConditionalRules::Legacy(legacy) => legacy,
        };

        let mut rules = vec![];
        for (pattern, requirements) in legacy.base_component {
            rules.push(ConditionalRule {
                base_component: Some(pattern),
                properties: IndexMap::new(),
                requirements,
            });
        }
        for (condition, requirements) in legacy.property_based {
            let (field, value) =
                condition
                    .split_once('=')
                    .ok_or_else(|| ConfigError::InvalidCondition {
                        library: library.to_string(),
                        condition: condition.clone(),
                    })?;
            rules.push(ConditionalRule {
                base_component: None,
                properties: IndexMap::from([(field.to_string(), value.to_string())]),
                requirements,
            });
        }
        Ok(rules)
    }
}

/// A regex that must match from the start of the value, not necessarily to its end.
#[derive(Debug, Clone)]
pub struct AnchoredPattern {
    source: String,
    regex: Regex,
}

impl AnchoredPattern {
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{})", source))?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    pub fn matches(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

#[derive(Debug, Clone)]
pub struct FieldPattern {
    pub key: String,
    pub pattern: AnchoredPattern,
}

/// Canonical conditional rule with its patterns compiled.
#[derive(Debug, Clone)]
pub struct ConditionalRequirement {
    pub base_component: Option<String>,
    pub properties: Vec<FieldPattern>,
    pub requirements: Vec<String>,
}

impl ConditionalRequirement {
    /// All present predicates must hold; absent ones are vacuously true.
    pub fn applies_to(&self, component: &ComponentDefinition) -> bool {
        if let Some(pattern) = &self.base_component {
            let base = component.base_component.as_deref().unwrap_or("");
            // substring match, which also covers prefix match
            if !base.contains(pattern.as_str()) {
                return false;
            }
        }
        self.properties.iter().all(|p| {
            component
                .property_value(&p.key)
                .map_or(false, |v| p.pattern.matches(v))
        })
    }
}

/// Fully composed policy for one library. Built fresh per library per run.
#[derive(Debug, Clone)]
pub struct EffectiveRuleSet {
    pub required_properties: Vec<String>,
    pub non_empty_properties: Vec<String>,
    pub property_patterns: Vec<FieldPattern>,
    pub max_property_length: usize,
    pub manufacturer_properties: Vec<String>,
    pub footprint_required: bool,
    pub conditional_rules: Vec<ConditionalRequirement>,
}

/// Merge the global config with a library's optional rule block.
pub fn compose_rules(
    global: &GlobalConfig,
    library: &str,
    block: Option<&RuleBlock>,
) -> Result<EffectiveRuleSet, ConfigError> {
    let empty = RuleBlock::default();
    let block = block.unwrap_or(&empty);

    let mut required = global.required_properties.clone();
    required.extend(block.required_properties.iter().flatten().cloned());

    let mut non_empty = global.non_empty_properties.clone();
    non_empty.extend(block.non_empty_properties.iter().flatten().cloned());

    let mut patterns = global.property_patterns.clone();
    if let Some(overrides) = &block.property_patterns {
        for (key, pattern) in overrides {
            patterns.insert(key.clone(), pattern.clone());
        }
    }

    let compile = |key: &str, pattern: &str| {
        AnchoredPattern::new(pattern)
            .map(|pattern| FieldPattern {
                key: key.to_string(),
                pattern,
            })
            .map_err(|source| ConfigError::InvalidPattern {
                library: library.to_string(),
                key: key.to_string(),
                pattern: pattern.to_string(),
                source,
            })
    };

    let property_patterns = patterns
        .iter()
        .map(|(key, pattern)| compile(key, pattern))
        .collect::<Result<Vec<_>, _>>()?;

    let canonical = match &block.conditional_required_properties {
        Some(rules) => rules.clone().normalize(library)?,
        None => vec![],
    };
    let conditional_rules = canonical
        .into_iter()
        .map(|rule| {
            let properties = rule
                .properties
                .iter()
                .map(|(key, pattern)| compile(key, pattern))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ConditionalRequirement {
                base_component: rule.base_component,
                properties,
                requirements: rule.requirements,
            })
        })
        .collect::<Result<Vec<_>, ConfigError>>()?;

    Ok(EffectiveRuleSet {
        required_properties: required,
        non_empty_properties: non_empty,
        property_patterns,
        max_property_length: block.max_property_length.unwrap_or(global.max_property_length),
        manufacturer_properties: block
            .manufacturer_properties
            .clone()
            .unwrap_or_else(|| global.manufacturer_properties.clone()),
        footprint_required: block.footprint_required.unwrap_or(true),
        conditional_rules,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::FieldOverride;

    fn block(yaml: &str) -> RuleBlock {
        serde_yaml_ng::from_str(yaml).unwrap()
    }

    #[test]
    fn test_lists_are_additive_and_keep_duplicates() {
        let rules = compose_rules(
            &GlobalConfig::default(),
            "Resistors",
            Some(&block("required_properties: [Power, Footprint]")),
        )
        .unwrap();
        assert_eq!(
            rules.required_properties,
            vec!["Footprint", "ki_description", "Power", "Footprint"]
        );
        assert_eq!(rules.non_empty_properties, vec!["Footprint", "ki_description"]);
    }

    #[test]
    fn test_patterns_overwrite_per_key() {
        let rules = compose_rules(
            &GlobalConfig::default(),
            "Resistors",
            Some(&block("property_patterns:\n  Footprint: '^Local:'\n  Power: '^[0-9]+W$'")),
        )
        .unwrap();
        let keys: Vec<_> = rules.property_patterns.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["Footprint", "LCSC Part", "Power"]);
        assert_eq!(rules.property_patterns[0].pattern.as_str(), "^Local:");
    }

    #[test]
    fn test_scalars_and_manufacturer_replacement() {
        let absent = compose_rules(&GlobalConfig::default(), "A", None).unwrap();
        assert_eq!(absent.max_property_length, 200);
        assert!(absent.footprint_required);
        assert_eq!(absent.manufacturer_properties.len(), 4);

        let rules = compose_rules(
            &GlobalConfig::default(),
            "A",
            Some(&block(
                "max_property_length: 50\nmanufacturer_properties: []\nfootprint_required: false",
            )),
        )
        .unwrap();
        assert_eq!(rules.max_property_length, 50);
        assert!(rules.manufacturer_properties.is_empty());
        assert!(!rules.footprint_required);
    }

    #[test]
    fn test_legacy_shape_is_normalized() {
        let legacy = block(
            r#"
conditional_required_properties:
  base_component:
    R_: [Power]
  property_based:
    "Type=a=b": [Package]
"#,
        );
        let rules = legacy.conditional_required_properties.unwrap().normalize("L").unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].base_component.as_deref(), Some("R_"));
        assert_eq!(rules[0].requirements, vec!["Power"]);
        // split once on the first '='
        assert_eq!(rules[1].properties["Type"], "a=b");
        assert_eq!(rules[1].base_component, None);
    }

    #[test]
    fn test_legacy_condition_without_equals_is_error() {
        let legacy =
            block("conditional_required_properties:\n  property_based:\n    Type: [Package]\n");
        let err = compose_rules(&GlobalConfig::default(), "Caps", Some(&legacy)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidCondition { ref library, .. } if library == "Caps"
        ));
    }

    #[test]
    fn test_invalid_regex_names_library() {
        let bad = block("property_patterns:\n  Value: '(['\n");
        let err = compose_rules(&GlobalConfig::default(), "Diodes", Some(&bad)).unwrap_err();
        assert!(err.to_string().contains("Diodes"));
    }

    #[test]
    fn test_conditional_and_semantics() {
        let canonical = block(
            r#"
conditional_required_properties:
  - base_component: R_
    properties:
      Power: '^[0-9]+W$'
    requirements: [Power Rating]
"#,
        );
        let rules = compose_rules(&GlobalConfig::default(), "R", Some(&canonical)).unwrap();
        let rule = &rules.conditional_rules[0];

        let mut c = ComponentDefinition {
            name: "R1".into(),
            base_component: Some("R_0603".into()),
            properties: vec![FieldOverride::new("Power", "1W")],
            ..Default::default()
        };
        assert!(rule.applies_to(&c));

        c.properties[0] = FieldOverride::new("Power", "1mW");
        assert!(!rule.applies_to(&c));

        c.properties[0] = FieldOverride::new("Power", "1W");
        c.base_component = Some("C_0603".into());
        assert!(!rule.applies_to(&c));

        c.base_component = Some("Base_R_".into());
        assert!(rule.applies_to(&c));

        c.properties[0] = FieldOverride::null("Power");
        assert!(!rule.applies_to(&c));
    }

    #[test]
    fn test_pattern_is_start_anchored_only() {
        let p = AnchoredPattern::new("7Sigma:").unwrap();
        assert!(p.matches("7Sigma:R_0402"));
        assert!(!p.matches("X:7Sigma:R_0402"));
    }
}
