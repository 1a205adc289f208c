use crate::core::RowId;
use crate::fields::FieldAttributes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Joins namespace and entity name in a physical table name.
pub const TABLE_SEPARATOR: &str = "__";

/// Natural key of an entity definition: `(namespace, name)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    pub namespace: String,
    pub name: String,
}

impl EntityKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Name of the physical table backing this entity, `{namespace}__{name}`.
    pub fn table_name(&self) -> String {
        format!("{}{}{}", self.namespace, TABLE_SEPARATOR, self.name)
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceRecord {
    pub id: RowId,
    pub name: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: RowId,
    pub namespace_id: RowId,
    pub name: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRecord {
    pub id: RowId,
    pub entity_id: RowId,
    pub name: String,
    pub label: String,
    pub field_type: String,
    pub nullable: bool,
    pub blank: bool,
    pub unique: bool,
    pub default: Option<String>,
    pub help_text: Option<String>,
}

impl FieldRecord {
    pub fn attributes(&self) -> FieldAttributes {
        FieldAttributes {
            name: self.name.clone(),
            label: self.label.clone(),
            nullable: self.nullable,
            blank: self.blank,
            unique: self.unique,
            help_text: self.help_text.clone(),
            default: self.default.clone(),
        }
    }
}

/// Operator input for a namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceDef {
    pub name: String,
    pub label: String,
}

impl NamespaceDef {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
        }
    }
}

/// Operator input for an entity definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDef {
    pub namespace: String,
    pub name: String,
    pub label: String,
}

impl EntityDef {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            label: label.into(),
        }
    }

    pub fn key(&self) -> EntityKey {
        EntityKey::new(self.namespace.clone(), self.name.clone())
    }
}

/// Operator input for a field definition.
///
/// Flags default to `nullable = true`, `blank = true`, `unique = false`, and the
/// label defaults to the field name.
///
/// ```
/// use dynamo::FieldDef;
///
/// let field = FieldDef::new("blog", "post", "title", "dynamiccharfield")
///     .label("Title")
///     .not_null()
///     .help_text("Headline shown in listings");
/// assert!(!field.nullable);
/// assert!(field.blank);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub namespace: String,
    pub entity: String,
    pub name: String,
    pub label: String,
    pub field_type: String,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default = "default_true")]
    pub blank: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub help_text: Option<String>,
}

fn default_true() -> bool {
    true
}

impl FieldDef {
    pub fn new(
        namespace: impl Into<String>,
        entity: impl Into<String>,
        name: impl Into<String>,
        field_type: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            namespace: namespace.into(),
            entity: entity.into(),
            label: name.clone(),
            name,
            field_type: field_type.into(),
            nullable: true,
            blank: true,
            unique: false,
            default: None,
            help_text: None,
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn not_blank(mut self) -> Self {
        self.blank = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn help_text(mut self, text: impl Into<String>) -> Self {
        self.help_text = Some(text.into());
        self
    }

    pub fn entity_key(&self) -> EntityKey {
        EntityKey::new(self.namespace.clone(), self.entity.clone())
    }

    pub fn attributes(&self) -> FieldAttributes {
        FieldAttributes {
            name: self.name.clone(),
            label: self.label.clone(),
            nullable: self.nullable,
            blank: self.blank,
            unique: self.unique,
            help_text: self.help_text.clone(),
            default: self.default.clone(),
        }
    }
}
