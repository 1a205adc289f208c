use crate::catalog::EntityKey;
use crate::core::{Column, DataType, DynamoError, Result, Value};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

lazy_static! {
    static ref URL: Regex =
        Regex::new(r"^(?i)(https?|ftps?)://[^\s/?#]+(\.[^\s/?#]+)*(:\d+)?([/?#]\S*)?$").unwrap();
}

/// Logical kind of a synthesized column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnKind {
    Boolean,
    Char,
    Date,
    DateTime,
    Integer,
    PositiveInteger,
    Text,
    Time,
    Url,
    /// Holds the row id of an instance of another synthesized type.
    Reference { target: EntityKey },
}

impl ColumnKind {
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Boolean => DataType::Boolean,
            Self::Char | Self::Text | Self::Url => DataType::Text,
            Self::Date => DataType::Date,
            Self::DateTime => DataType::DateTime,
            Self::Integer | Self::PositiveInteger | Self::Reference { .. } => DataType::Integer,
            Self::Time => DataType::Time,
        }
    }

    /// String-valued kinds take part in display labels and blank checks.
    pub fn is_string(&self) -> bool {
        matches!(self, Self::Char | Self::Text | Self::Url)
    }

    pub fn reference_target(&self) -> Option<&EntityKey> {
        match self {
            Self::Reference { target } => Some(target),
            _ => None,
        }
    }

    /// Parse operator-supplied text into a value of this kind.
    pub fn coerce(&self, text: &str) -> std::result::Result<Value, String> {
        let trimmed = text.trim();
        match self {
            Self::Boolean => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "t" | "1" | "yes" | "on" => Ok(Value::Boolean(true)),
                "false" | "f" | "0" | "no" | "off" => Ok(Value::Boolean(false)),
                _ => Err("expected a boolean".to_string()),
            },
            Self::Char | Self::Text | Self::Url => Ok(Value::Text(text.to_string())),
            Self::Integer => trimmed
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|e| e.to_string()),
            Self::PositiveInteger => match trimmed.parse::<i64>() {
                Ok(i) if i >= 0 => Ok(Value::Integer(i)),
                Ok(_) => Err("expected a non-negative integer".to_string()),
                Err(e) => Err(e.to_string()),
            },
            Self::Reference { .. } => match trimmed.parse::<i64>() {
                Ok(i) if i > 0 => Ok(Value::Integer(i)),
                _ => Err("expected a row id".to_string()),
            },
            Self::Date => NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .map(Value::Date)
                .map_err(|e| e.to_string()),
            Self::Time => NaiveTime::parse_from_str(trimmed, "%H:%M:%S")
                .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M"))
                .map(Value::Time)
                .map_err(|e| e.to_string()),
            Self::DateTime => NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S")
                .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S"))
                .or_else(|_| DateTime::parse_from_rfc3339(trimmed).map(|dt| dt.naive_utc()))
                .map(Value::DateTime)
                .map_err(|e| e.to_string()),
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean => write!(f, "boolean"),
            Self::Char => write!(f, "char"),
            Self::Date => write!(f, "date"),
            Self::DateTime => write!(f, "datetime"),
            Self::Integer => write!(f, "integer"),
            Self::PositiveInteger => write!(f, "positive_integer"),
            Self::Text => write!(f, "text"),
            Self::Time => write!(f, "time"),
            Self::Url => write!(f, "url"),
            Self::Reference { target } => write!(f, "reference({})", target),
        }
    }
}

/// Storage-column specification produced for one field definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
    pub label: String,
    pub nullable: bool,
    pub blank: bool,
    pub unique: bool,
    pub help_text: Option<String>,
    /// Applied when an instance omits the field; never stored on the physical column.
    pub default: Option<Value>,
    pub max_length: Option<usize>,
}

impl ColumnSpec {
    /// Physical column for this spec. Defaults stay out of storage.
    pub fn physical_column(&self) -> Column {
        Column::new(self.name.clone(), self.kind.data_type())
            .nullable(self.nullable)
            .unique(self.unique)
    }

    /// Whether two specs would produce the same physical column.
    pub fn same_physical_shape(&self, other: &ColumnSpec) -> bool {
        self.physical_column() == other.physical_column()
    }

    /// Check a value against this column's constraints.
    pub fn check(&self, value: &Value) -> Result<()> {
        if value.is_null() {
            if !self.nullable {
                return Err(DynamoError::ConstraintViolation(format!(
                    "Field '{}' cannot be null",
                    self.name
                )));
            }
            return Ok(());
        }

        let data_type = self.kind.data_type();
        if !data_type.is_compatible(value) {
            return Err(DynamoError::TypeMismatch(format!(
                "Field '{}' expects {}, got {}",
                self.name,
                self.kind,
                value.type_name()
            )));
        }

        match (&self.kind, value) {
            (kind, Value::Text(s)) if kind.is_string() => {
                if s.is_empty() && !self.blank {
                    return Err(DynamoError::ConstraintViolation(format!(
                        "Field '{}' cannot be blank",
                        self.name
                    )));
                }
                if let Some(max) = self.max_length
                    && s.chars().count() > max
                {
                    return Err(DynamoError::ConstraintViolation(format!(
                        "Field '{}' is longer than {} characters",
                        self.name, max
                    )));
                }
                if *kind == ColumnKind::Url && !s.is_empty() && !URL.is_match(s) {
                    return Err(DynamoError::ConstraintViolation(format!(
                        "Field '{}' is not a valid URL: {}",
                        self.name, s
                    )));
                }
            }
            (ColumnKind::PositiveInteger, Value::Integer(i)) if *i < 0 => {
                return Err(DynamoError::ConstraintViolation(format!(
                    "Field '{}' must be non-negative",
                    self.name
                )));
            }
            (ColumnKind::Reference { target }, Value::Integer(i)) if *i <= 0 => {
                return Err(DynamoError::ConstraintViolation(format!(
                    "Field '{}' holds invalid {} id {}",
                    self.name, target, i
                )));
            }
            _ => {}
        }
        Ok(())
    }
}
