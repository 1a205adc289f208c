use crate::catalog::{EntityKey, EntityRecord, FieldRecord, NamespaceRecord};
use crate::config::{DynamoConfig, UnresolvedFieldPolicy};
use crate::core::{DynamoError, Result, RowId};
use crate::fields::{ColumnSpec, FieldSpecRegistry};
use crate::rows::EntityInstance;
use crate::storage::TableSchema;
use serde::Serialize;
use tracing::warn;

/// Catalog state a type is synthesized from.
#[derive(Debug, Clone)]
pub struct EntitySnapshot {
    pub namespace: NamespaceRecord,
    pub entity: EntityRecord,
    pub fields: Vec<FieldRecord>,
    /// Every entity of the same namespace, used to resolve reference tags.
    pub siblings: Vec<EntityRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeMeta {
    pub namespace: String,
    pub namespace_label: String,
    pub verbose_name: String,
    pub verbose_name_plural: String,
    pub ordering: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
    pub id: RowId,
    pub tag: String,
    pub column: ColumnSpec,
}

impl FieldDescriptor {
    pub fn name(&self) -> &str {
        &self.column.name
    }
}

/// Recorded when a field was synthesized as a char column because its tag
/// resolved to nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionWarning {
    pub field: String,
    pub tag: String,
}

/// Queryable type descriptor built from an entity definition and its fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SynthesizedType {
    pub key: EntityKey,
    pub entity_id: RowId,
    pub label: String,
    pub table_name: String,
    pub meta: TypeMeta,
    pub fields: Vec<FieldDescriptor>,
    pub warnings: Vec<ResolutionWarning>,
    display_label_fields: usize,
}

impl SynthesizedType {
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name() == name)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(FieldDescriptor::name).collect()
    }

    /// Physical table layout, one column per field in field order.
    pub fn table_schema(&self) -> TableSchema {
        TableSchema::new(
            self.table_name.clone(),
            self.fields.iter().map(|f| f.column.physical_column()).collect(),
        )
    }

    /// Human-readable label of an instance.
    ///
    /// Joins the non-empty values of the first string-valued fields with a
    /// single space; falls back to the entity label.
    pub fn display_label(&self, instance: &EntityInstance) -> String {
        let parts: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.column.kind.is_string())
            .take(self.display_label_fields)
            .filter_map(|f| instance.get(f.name()).and_then(|v| v.as_str()))
            .filter(|s| !s.is_empty())
            .collect();

        if parts.is_empty() {
            self.label.clone()
        } else {
            parts.join(" ")
        }
    }
}

/// Builds [`SynthesizedType`]s. Pure: the same snapshot always yields an equal type.
#[derive(Debug, Clone)]
pub struct TypeSynthesizer {
    registry: FieldSpecRegistry,
    policy: UnresolvedFieldPolicy,
    display_label_fields: usize,
}

impl TypeSynthesizer {
    pub fn new(config: &DynamoConfig) -> Self {
        Self {
            registry: FieldSpecRegistry::new(config),
            policy: config.unresolved_field_policy,
            display_label_fields: config.display_label_fields,
        }
    }

    pub fn registry(&self) -> &FieldSpecRegistry {
        &self.registry
    }

    pub fn policy(&self) -> UnresolvedFieldPolicy {
        self.policy
    }

    pub fn synthesize(&self, snapshot: &EntitySnapshot) -> Result<SynthesizedType> {
        let namespace = &snapshot.namespace;
        let entity = &snapshot.entity;
        let key = EntityKey::new(namespace.name.clone(), entity.name.clone());

        let meta = TypeMeta {
            namespace: namespace.name.clone(),
            namespace_label: namespace.label.clone(),
            verbose_name: entity.label.clone(),
            verbose_name_plural: format!("{}s", entity.label),
            ordering: vec!["id".to_string()],
        };

        let mut records: Vec<&FieldRecord> = snapshot.fields.iter().collect();
        records.sort_by_key(|f| f.id);

        let mut fields = Vec::with_capacity(records.len());
        let mut warnings = Vec::new();
        for record in records {
            let column = match self.resolve_column(snapshot, record)? {
                Some(column) => column,
                None => {
                    warn!(
                        "Field '{}' on {} has unresolvable type '{}', using a char column",
                        record.name, key, record.field_type
                    );
                    warnings.push(ResolutionWarning {
                        field: record.name.clone(),
                        tag: record.field_type.clone(),
                    });
                    self.registry.fallback(&record.attributes())?
                }
            };
            fields.push(FieldDescriptor {
                id: record.id,
                tag: record.field_type.clone(),
                column,
            });
        }

        Ok(SynthesizedType {
            table_name: key.table_name(),
            key,
            entity_id: entity.id,
            label: entity.label.clone(),
            meta,
            fields,
            warnings,
            display_label_fields: self.display_label_fields,
        })
    }

    /// Built-in kind first, then an entity of the same namespace.
    ///
    /// `Ok(None)` means unresolved under the fallback policy.
    fn resolve_column(
        &self,
        snapshot: &EntitySnapshot,
        record: &FieldRecord,
    ) -> Result<Option<ColumnSpec>> {
        let attrs = record.attributes();
        if let Some(column) = self.registry.resolve(&record.field_type, &attrs)? {
            return Ok(Some(column));
        }

        if let Some(target) = snapshot
            .siblings
            .iter()
            .find(|e| e.name == record.field_type)
        {
            let target = EntityKey::new(snapshot.namespace.name.clone(), target.name.clone());
            return self.registry.reference(target, &attrs).map(Some);
        }

        match self.policy {
            UnresolvedFieldPolicy::Reject => Err(DynamoError::UnresolvableFieldType {
                field: record.name.clone(),
                tag: record.field_type.clone(),
            }),
            UnresolvedFieldPolicy::FallbackToChar => Ok(None),
        }
    }
}
