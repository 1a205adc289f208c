use crate::core::{DynamoError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What synthesis does with a field-type tag that resolves to nothing.
///
/// This only covers rows already in the catalog whose tag stopped
/// resolving, such as a reference to an entity that was removed outside the
/// engine. Saving a field with an unresolvable tag is always rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedFieldPolicy {
    /// Fail with `UnresolvableFieldType`.
    #[default]
    Reject,
    /// Synthesize a char column and record a resolution warning.
    FallbackToChar,
}

/// Engine configuration
///
/// # Examples
///
/// ```
/// use dynamo::{DynamoConfig, UnresolvedFieldPolicy};
///
/// let config = DynamoConfig::new()
///     .unresolved_field_policy(UnresolvedFieldPolicy::FallbackToChar)
///     .char_max_length(128);
/// assert_eq!(config.char_max_length, 128);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamoConfig {
    /// Policy for field-type tags that are neither built-in nor a known entity
    pub unresolved_field_policy: UnresolvedFieldPolicy,

    /// Implicit maximum length of char columns
    pub char_max_length: usize,

    /// Implicit maximum length of url columns
    pub url_max_length: usize,

    /// How many string-valued fields make up an instance's display label
    pub display_label_fields: usize,

    /// Require a field's tag to appear in the current choice set when saving
    pub validate_choices_on_save: bool,
}

impl DynamoConfig {
    pub fn new() -> Self {
        Self {
            unresolved_field_policy: UnresolvedFieldPolicy::Reject,
            char_max_length: 255,
            url_max_length: 200,
            display_label_fields: 3,
            validate_choices_on_save: true,
        }
    }

    pub fn unresolved_field_policy(mut self, policy: UnresolvedFieldPolicy) -> Self {
        self.unresolved_field_policy = policy;
        self
    }

    pub fn char_max_length(mut self, max: usize) -> Self {
        self.char_max_length = max;
        self
    }

    pub fn url_max_length(mut self, max: usize) -> Self {
        self.url_max_length = max;
        self
    }

    pub fn display_label_fields(mut self, count: usize) -> Self {
        self.display_label_fields = count;
        self
    }

    pub fn validate_choices_on_save(mut self, enabled: bool) -> Self {
        self.validate_choices_on_save = enabled;
        self
    }

    /// Parse from a JSON document; absent keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.char_max_length == 0 || self.url_max_length == 0 {
            return Err(DynamoError::Config(
                "maximum lengths must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for DynamoConfig {
    fn default() -> Self {
        Self::new()
    }
}
