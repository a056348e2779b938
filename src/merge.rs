//! Property Merger - Overrides onto Base Template Fields
//!
//! Overrides apply strictly in declaration order. Each one sees the fields
//! as left by the ones before it, never the ones after.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::definitions::{ComponentDefinition, Effects, FieldOverride, Position};
use crate::interpolate::{resolve_with, TemplateResolutionError};
use crate::templates::{SymbolTemplate, TemplateRegistry};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MergeError {
    #[error("Component '{component}' has no base_component")]
    MissingBase { component: String },

    #[error("Base component '{base}' for '{component}' not found in template set")]
    BaseTemplateNotFound { component: String, base: String },

    #[error("Component '{component}': {source}")]
    Resolution {
        component: String,
        #[source]
        source: TemplateResolutionError,
    },
}

/// A field attached to one symbol instance. Never shared between instances.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkingField {
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub effects: Effects,
    #[serde(default, rename = "showName")]
    pub show_name: bool,
}

impl WorkingField {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            position: Position::default(),
            effects: Effects::default(),
            show_name: false,
        }
    }

    /// New field for a key the base template does not have.
    /// Hidden unless the override says otherwise.
    fn appended(ov: &FieldOverride, value: String) -> Self {
        let effects = ov.effects.clone().unwrap_or_default();
        Self {
            key: ov.key.clone(),
            value,
            position: ov.position.unwrap_or_default(),
            effects: Effects {
                font: effects.font.unwrap_or_default(),
                hide: effects.hide.unwrap_or(true),
            },
            show_name: ov.show_name.unwrap_or(false),
        }
    }

    /// Update in place; sub-attributes the override omits stay inherited.
    fn update(&mut self, ov: &FieldOverride, value: String) {
        self.value = value;
        if let Some(position) = ov.position {
            self.position = position;
        }
        if let Some(effects) = &ov.effects {
            if let Some(font) = &effects.font {
                self.effects.font = font.clone();
            }
            if let Some(hide) = effects.hide {
                self.effects.hide = hide;
            }
        }
        if let Some(show_name) = ov.show_name {
            self.show_name = show_name;
        }
    }
}

fn apply_override(
    fields: &mut Vec<WorkingField>,
    ov: &FieldOverride,
    remove: &[String],
) -> Result<(), TemplateResolutionError> {
    // The symbol format has no null; "not applicable" is written as empty text.
    let value = match ov.value.as_deref() {
        Some(raw) => resolve_with(&ov.key, raw, |name| {
            // fields on their way out are not visible to templates
            if remove.iter().any(|r| r == name) {
                return None;
            }
            fields.iter().find(|f| f.key == name).map(|f| f.value.as_str())
        })?,
        None => String::new(),
    };

    match fields.iter_mut().find(|f| f.key == ov.key) {
        Some(field) => field.update(ov, value),
        None => fields.push(WorkingField::appended(ov, value)),
    }
    Ok(())
}

/// Apply `overrides` to a copy of `base`, then drop every key in `remove`.
///
/// Untouched and updated fields keep base order, new fields follow in
/// append order.
pub fn merge_fields(
    base: &[WorkingField],
    overrides: &[FieldOverride],
    remove: &[String],
) -> Result<Vec<WorkingField>, TemplateResolutionError> {
    let mut fields = base.to_vec();
    for ov in overrides {
        apply_override(&mut fields, ov, remove)?;
    }
    fields.retain(|f| !remove.contains(&f.key));
    Ok(fields)
}

/// Derive the symbol for one component from its base template.
pub fn merge_component(
    registry: &TemplateRegistry,
    component: &ComponentDefinition,
) -> Result<SymbolTemplate, MergeError> {
    let base_name = component
        .base_component
        .as_deref()
        .filter(|b| !b.is_empty())
        .ok_or_else(|| MergeError::MissingBase {
            component: component.display_name().to_string(),
        })?;

    let base = registry
        .get(base_name)
        .ok_or_else(|| MergeError::BaseTemplateNotFound {
            component: component.display_name().to_string(),
            base: base_name.to_string(),
        })?;

    let mut symbol = base.derive(&component.name);
    symbol.fields = merge_fields(&base.fields, &component.properties, &component.remove_properties)
        .map_err(|source| MergeError::Resolution {
            component: component.display_name().to_string(),
            source,
        })?;
    Ok(symbol)
}
