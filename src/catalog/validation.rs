use crate::catalog::TABLE_SEPARATOR;
use crate::core::{DynamoError, Result};
use lazy_static::lazy_static;
use regex::Regex;

pub const MAX_NAME_LENGTH: usize = 64;
pub const MAX_LABEL_LENGTH: usize = 128;
pub const MAX_HELP_TEXT_LENGTH: usize = 256;

/// Column name every physical table reserves for the row id.
pub const RESERVED_FIELD_NAMES: &[&str] = &["id"];

lazy_static! {
    static ref IDENTIFIER: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

/// Internal names end up in table and column names, so they must be plain identifiers.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(DynamoError::InvalidName(
            name.to_string(),
            "name cannot be empty".to_string(),
        ));
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(DynamoError::InvalidName(
            name.to_string(),
            format!("longer than {} characters", MAX_NAME_LENGTH),
        ));
    }
    if !IDENTIFIER.is_match(name) {
        return Err(DynamoError::InvalidName(
            name.to_string(),
            "only letters, digits and '_' are allowed, and it cannot start with a digit"
                .to_string(),
        ));
    }
    Ok(())
}

/// Namespace and entity names, which are joined by [`TABLE_SEPARATOR`] into
/// a table name. They cannot contain the separator or start or end with `_`,
/// so every table name splits back into exactly one key.
///
/// [`TABLE_SEPARATOR`]: crate::catalog::TABLE_SEPARATOR
pub fn validate_key_segment(name: &str) -> Result<()> {
    validate_identifier(name)?;
    if name.contains(TABLE_SEPARATOR) {
        return Err(DynamoError::InvalidName(
            name.to_string(),
            format!("cannot contain '{}'", TABLE_SEPARATOR),
        ));
    }
    if name.starts_with('_') || name.ends_with('_') {
        return Err(DynamoError::InvalidName(
            name.to_string(),
            "cannot start or end with '_'".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_field_name(name: &str) -> Result<()> {
    validate_identifier(name)?;
    if RESERVED_FIELD_NAMES.contains(&name) {
        return Err(DynamoError::InvalidName(
            name.to_string(),
            "reserved column name".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_label(label: &str) -> Result<()> {
    if label.trim().is_empty() {
        return Err(DynamoError::InvalidName(
            label.to_string(),
            "label cannot be blank".to_string(),
        ));
    }
    if label.chars().count() > MAX_LABEL_LENGTH {
        return Err(DynamoError::InvalidName(
            label.to_string(),
            format!("label longer than {} characters", MAX_LABEL_LENGTH),
        ));
    }
    Ok(())
}

pub fn validate_help_text(text: Option<&str>) -> Result<()> {
    match text {
        Some(text) if text.chars().count() > MAX_HELP_TEXT_LENGTH => Err(DynamoError::InvalidName(
            text.to_string(),
            format!("help text longer than {} characters", MAX_HELP_TEXT_LENGTH),
        )),
        _ => Ok(()),
    }
}
