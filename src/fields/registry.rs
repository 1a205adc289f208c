use super::spec::{ColumnKind, ColumnSpec};
use crate::catalog::EntityKey;
use crate::config::DynamoConfig;
use crate::core::{DynamoError, Result};
use lazy_static::lazy_static;
use std::collections::HashMap;

/// Uniform attribute bag every column constructor receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldAttributes {
    pub name: String,
    pub label: String,
    pub nullable: bool,
    pub blank: bool,
    pub unique: bool,
    pub help_text: Option<String>,
    pub default: Option<String>,
}

/// Length limits applied to string-like kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthLimits {
    pub char_max_length: usize,
    pub url_max_length: usize,
}

type Constructor = fn(&FieldAttributes, &LengthLimits) -> Result<ColumnSpec>;

pub struct BuiltinField {
    pub tag: &'static str,
    pub label: &'static str,
    pub kind: ColumnKind,
    constructor: Constructor,
}

lazy_static! {
    static ref BUILTIN_FIELDS: Vec<BuiltinField> = vec![
        builtin("dynamicbooleanfield", "Boolean", ColumnKind::Boolean, boolean_field),
        builtin("dynamiccharfield", "Char", ColumnKind::Char, char_field),
        builtin("dynamicdatefield", "Date", ColumnKind::Date, date_field),
        builtin("dynamicdatetimefield", "Date/Time", ColumnKind::DateTime, datetime_field),
        builtin("dynamicintegerfield", "Integer", ColumnKind::Integer, integer_field),
        builtin(
            "dynamicpositiveintegerfield",
            "Positive Integer",
            ColumnKind::PositiveInteger,
            positive_integer_field
        ),
        builtin("dynamictextfield", "Text", ColumnKind::Text, text_field),
        builtin("dynamictimefield", "Time", ColumnKind::Time, time_field),
        builtin("dynamicurlfield", "URL", ColumnKind::Url, url_field),
    ];
    static ref BY_TAG: HashMap<&'static str, usize> = BUILTIN_FIELDS
        .iter()
        .enumerate()
        .map(|(idx, field)| (field.tag, idx))
        .collect();
}

fn builtin(
    tag: &'static str,
    label: &'static str,
    kind: ColumnKind,
    constructor: Constructor,
) -> BuiltinField {
    BuiltinField {
        tag,
        label,
        kind,
        constructor,
    }
}

fn column(kind: ColumnKind, max_length: Option<usize>, attrs: &FieldAttributes) -> Result<ColumnSpec> {
    let default = match &attrs.default {
        Some(text) => Some(kind.coerce(text).map_err(|reason| DynamoError::InvalidDefault {
            field: attrs.name.clone(),
            value: text.clone(),
            reason,
        })?),
        None => None,
    };

    let spec = ColumnSpec {
        name: attrs.name.clone(),
        kind,
        label: attrs.label.clone(),
        nullable: attrs.nullable,
        blank: attrs.blank,
        unique: attrs.unique,
        help_text: attrs.help_text.clone(),
        default,
        max_length,
    };

    if let (Some(text), Some(value)) = (&attrs.default, &spec.default) {
        spec.check(value).map_err(|err| DynamoError::InvalidDefault {
            field: attrs.name.clone(),
            value: text.clone(),
            reason: err.to_string(),
        })?;
    }
    Ok(spec)
}

fn boolean_field(attrs: &FieldAttributes, _: &LengthLimits) -> Result<ColumnSpec> {
    column(ColumnKind::Boolean, None, attrs)
}

fn char_field(attrs: &FieldAttributes, limits: &LengthLimits) -> Result<ColumnSpec> {
    column(ColumnKind::Char, Some(limits.char_max_length), attrs)
}

fn date_field(attrs: &FieldAttributes, _: &LengthLimits) -> Result<ColumnSpec> {
    column(ColumnKind::Date, None, attrs)
}

fn datetime_field(attrs: &FieldAttributes, _: &LengthLimits) -> Result<ColumnSpec> {
    column(ColumnKind::DateTime, None, attrs)
}

fn integer_field(attrs: &FieldAttributes, _: &LengthLimits) -> Result<ColumnSpec> {
    column(ColumnKind::Integer, None, attrs)
}

fn positive_integer_field(attrs: &FieldAttributes, _: &LengthLimits) -> Result<ColumnSpec> {
    column(ColumnKind::PositiveInteger, None, attrs)
}

fn text_field(attrs: &FieldAttributes, _: &LengthLimits) -> Result<ColumnSpec> {
    column(ColumnKind::Text, None, attrs)
}

fn time_field(attrs: &FieldAttributes, _: &LengthLimits) -> Result<ColumnSpec> {
    column(ColumnKind::Time, None, attrs)
}

fn url_field(attrs: &FieldAttributes, limits: &LengthLimits) -> Result<ColumnSpec> {
    column(ColumnKind::Url, Some(limits.url_max_length), attrs)
}

/// Maps field-type tags to column constructors.
///
/// Only built-in scalar kinds live in the table; references to other
/// entities are built through [`FieldSpecRegistry::reference`] once the
/// caller has found the target.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpecRegistry {
    limits: LengthLimits,
}

impl FieldSpecRegistry {
    pub fn new(config: &DynamoConfig) -> Self {
        Self {
            limits: LengthLimits {
                char_max_length: config.char_max_length,
                url_max_length: config.url_max_length,
            },
        }
    }

    /// Built-in fields in choice order.
    pub fn builtins() -> &'static [BuiltinField] {
        &BUILTIN_FIELDS
    }

    pub fn is_builtin(tag: &str) -> bool {
        BY_TAG.contains_key(tag)
    }

    pub fn builtin(tag: &str) -> Option<&'static BuiltinField> {
        BY_TAG.get(tag).map(|idx| &BUILTIN_FIELDS[*idx])
    }

    /// Build the column for a built-in tag; `Ok(None)` when the tag is not built in.
    pub fn resolve(&self, tag: &str, attrs: &FieldAttributes) -> Result<Option<ColumnSpec>> {
        match Self::builtin(tag) {
            Some(field) => (field.constructor)(attrs, &self.limits).map(Some),
            None => Ok(None),
        }
    }

    /// Column holding the row id of an instance of `target`.
    pub fn reference(&self, target: EntityKey, attrs: &FieldAttributes) -> Result<ColumnSpec> {
        column(ColumnKind::Reference { target }, None, attrs)
    }

    /// Char column used when a tag cannot be resolved and fallback is allowed.
    pub fn fallback(&self, attrs: &FieldAttributes) -> Result<ColumnSpec> {
        char_field(attrs, &self.limits)
    }
}

impl Default for FieldSpecRegistry {
    fn default() -> Self {
        Self::new(&DynamoConfig::default())
    }
}
