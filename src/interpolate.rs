//! Template Resolver - `{identifier}` Substitution
//!
//! Straight lookup of field values. No expressions, no format specifiers,
//! no nesting. `{{` and `}}` produce literal braces.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::merge::WorkingField;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TemplateResolutionError {
    #[error("Template variable '{field}' in '{key}' is not defined at this point")]
    UnknownField { key: String, field: String },

    #[error("Malformed template token '{{{token}}}' in '{key}'")]
    MalformedToken { key: String, token: String },

    #[error("Unbalanced brace in '{key}' value '{value}'")]
    UnbalancedBrace { key: String, value: String },
}

/// Only values containing both braces are treated as templates.
pub fn needs_interpolation(raw: &str) -> bool {
    raw.contains('{') && raw.contains('}')
}

fn is_identifier(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_alphanumeric() || c == '_')
}

/// Substitute every `{identifier}` in `raw` with the value of the field of that
/// name in `fields`. `key` is the field being written, used for error context.
pub fn resolve(
    key: &str,
    raw: &str,
    fields: &[WorkingField],
) -> Result<String, TemplateResolutionError> {
    resolve_with(key, raw, |name| {
        fields.iter().find(|f| f.key == name).map(|f| f.value.as_str())
    })
}

/// Like [`resolve`], with the field lookup supplied by the caller.
pub fn resolve_with<'a, F>(
    key: &str,
    raw: &str,
    lookup: F,
) -> Result<String, TemplateResolutionError>
where
    F: Fn(&str) -> Option<&'a str>,
{
    if !needs_interpolation(raw) {
        return Ok(raw.to_string());
    }

    let unbalanced = || TemplateResolutionError::UnbalancedBrace {
        key: key.to_string(),
        value: raw.to_string(),
    };

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(pos) = rest.find(|c: char| c == '{' || c == '}') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if tail.starts_with("{{") {
            out.push('{');
            rest = &tail[2..];
        } else if tail.starts_with("}}") {
            out.push('}');
            rest = &tail[2..];
        } else if tail.starts_with('}') {
            return Err(unbalanced());
        } else {
            let close = tail.find('}').ok_or_else(unbalanced)?;
            let token = &tail[1..close];
            if !is_identifier(token) {
                return Err(TemplateResolutionError::MalformedToken {
                    key: key.to_string(),
                    token: token.to_string(),
                });
            }
            let value = lookup(token).ok_or_else(|| TemplateResolutionError::UnknownField {
                key: key.to_string(),
                field: token.to_string(),
            })?;
            out.push_str(value);
            rest = &tail[close + 1..];
        }
    }
    out.push_str(rest);
    Ok(out)
}

fn token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(r"\{(\w+)\}").expect("static regex"))
}

/// Identifiers referenced by `{identifier}` tokens, in order of appearance.
///
/// Lenient counterpart of [`resolve`] for static checks: anything that is not
/// a well-formed token is ignored rather than reported.
pub fn referenced_identifiers(raw: &str) -> Vec<&str> {
    if !needs_interpolation(raw) {
        return vec![];
    }
    token_regex()
        .captures_iter(raw)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .collect()
}
