use super::records::{
    EntityDef, EntityKey, EntityRecord, FieldDef, FieldRecord, NamespaceDef, NamespaceRecord,
};
use crate::core::{Column, DataType, DynamoError, Result, Row, RowId, Value};
use crate::storage::{DdlStatement, StorageEngine, TableSchema};
use crate::synth::EntitySnapshot;
use crate::transaction::TransactionId;
use std::sync::Arc;
use tracing::info;

// System table names contain no `__`, so no entity table can take one.
pub const NAMESPACE_TABLE: &str = "dynamo_namespace";
pub const ENTITY_TABLE: &str = "dynamo_entity";
pub const FIELD_TABLE: &str = "dynamo_field";

/// Conversion between a catalog record and its system-table row.
trait CatalogRow: Sized {
    const TABLE: &'static str;

    fn table_schema() -> TableSchema;

    fn to_row(&self) -> Row;

    fn from_row(id: RowId, row: &Row) -> Result<Self>;
}

impl CatalogRow for NamespaceRecord {
    const TABLE: &'static str = NAMESPACE_TABLE;

    fn table_schema() -> TableSchema {
        TableSchema::new(
            Self::TABLE,
            vec![
                Column::new("name", DataType::Text).not_null().unique(true),
                Column::new("label", DataType::Text).not_null(),
            ],
        )
    }

    fn to_row(&self) -> Row {
        vec![self.name.as_str().into(), self.label.as_str().into()]
    }

    fn from_row(id: RowId, row: &Row) -> Result<Self> {
        Ok(Self {
            id,
            name: text(Self::TABLE, row, 0)?,
            label: text(Self::TABLE, row, 1)?,
        })
    }
}

impl CatalogRow for EntityRecord {
    const TABLE: &'static str = ENTITY_TABLE;

    fn table_schema() -> TableSchema {
        TableSchema::new(
            Self::TABLE,
            vec![
                Column::new("namespace_id", DataType::Integer).not_null(),
                Column::new("name", DataType::Text).not_null(),
                Column::new("label", DataType::Text).not_null(),
            ],
        )
        .with_unique_together(["namespace_id", "name"])
    }

    fn to_row(&self) -> Row {
        vec![
            Value::Integer(self.namespace_id as i64),
            self.name.as_str().into(),
            self.label.as_str().into(),
        ]
    }

    fn from_row(id: RowId, row: &Row) -> Result<Self> {
        Ok(Self {
            id,
            namespace_id: integer(Self::TABLE, row, 0)?,
            name: text(Self::TABLE, row, 1)?,
            label: text(Self::TABLE, row, 2)?,
        })
    }
}

impl CatalogRow for FieldRecord {
    const TABLE: &'static str = FIELD_TABLE;

    fn table_schema() -> TableSchema {
        TableSchema::new(
            Self::TABLE,
            vec![
                Column::new("entity_id", DataType::Integer).not_null(),
                Column::new("name", DataType::Text).not_null(),
                Column::new("label", DataType::Text).not_null(),
                Column::new("field_type", DataType::Text).not_null(),
                Column::new("nullable", DataType::Boolean).not_null(),
                Column::new("blank", DataType::Boolean).not_null(),
                Column::new("is_unique", DataType::Boolean).not_null(),
                Column::new("default_value", DataType::Text),
                Column::new("help_text", DataType::Text),
            ],
        )
        .with_unique_together(["entity_id", "name"])
    }

    fn to_row(&self) -> Row {
        vec![
            Value::Integer(self.entity_id as i64),
            self.name.as_str().into(),
            self.label.as_str().into(),
            self.field_type.as_str().into(),
            self.nullable.into(),
            self.blank.into(),
            self.unique.into(),
            self.default.clone().into(),
            self.help_text.clone().into(),
        ]
    }

    fn from_row(id: RowId, row: &Row) -> Result<Self> {
        Ok(Self {
            id,
            entity_id: integer(Self::TABLE, row, 0)?,
            name: text(Self::TABLE, row, 1)?,
            label: text(Self::TABLE, row, 2)?,
            field_type: text(Self::TABLE, row, 3)?,
            nullable: boolean(Self::TABLE, row, 4)?,
            blank: boolean(Self::TABLE, row, 5)?,
            unique: boolean(Self::TABLE, row, 6)?,
            default: optional_text(Self::TABLE, row, 7)?,
            help_text: optional_text(Self::TABLE, row, 8)?,
        })
    }
}

fn corrupt(table: &str, idx: usize, value: &Value) -> DynamoError {
    DynamoError::TypeMismatch(format!(
        "Corrupt catalog row in '{}': column {} holds {}",
        table,
        idx,
        value.type_name()
    ))
}

fn cell<'a>(table: &str, row: &'a Row, idx: usize) -> Result<&'a Value> {
    row.get(idx)
        .ok_or_else(|| corrupt(table, idx, &Value::Null))
}

fn text(table: &str, row: &Row, idx: usize) -> Result<String> {
    let value = cell(table, row, idx)?;
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| corrupt(table, idx, value))
}

fn optional_text(table: &str, row: &Row, idx: usize) -> Result<Option<String>> {
    match cell(table, row, idx)? {
        Value::Null => Ok(None),
        Value::Text(s) => Ok(Some(s.clone())),
        other => Err(corrupt(table, idx, other)),
    }
}

fn integer(table: &str, row: &Row, idx: usize) -> Result<RowId> {
    let value = cell(table, row, idx)?;
    value
        .as_i64()
        .and_then(|i| RowId::try_from(i).ok())
        .ok_or_else(|| corrupt(table, idx, value))
}

fn boolean(table: &str, row: &Row, idx: usize) -> Result<bool> {
    let value = cell(table, row, idx)?;
    value.as_bool().ok_or_else(|| corrupt(table, idx, value))
}

/// Catalog rows for namespaces, entities and fields, stored in system tables
/// of the same engine that holds the physical entity tables.
///
/// Writes apply on their own unless the store was scoped with
/// [`in_unit`](Self::in_unit), in which case they join that transaction.
#[derive(Clone)]
pub struct CatalogStore {
    storage: Arc<dyn StorageEngine>,
    txn: Option<TransactionId>,
}

impl CatalogStore {
    pub fn new(storage: Arc<dyn StorageEngine>) -> Self {
        Self { storage, txn: None }
    }

    /// A view whose writes are part of `txn`.
    pub fn in_unit(&self, txn: TransactionId) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            txn: Some(txn),
        }
    }

    pub fn storage(&self) -> &Arc<dyn StorageEngine> {
        &self.storage
    }

    /// Create the system tables that do not exist yet.
    pub async fn install(&self) -> Result<()> {
        for schema in [
            NamespaceRecord::table_schema(),
            EntityRecord::table_schema(),
            FieldRecord::table_schema(),
        ] {
            if self.storage.table_exists(schema.name()).await {
                continue;
            }
            info!("Installing catalog table {}", schema.name());
            self.storage
                .execute_ddl(self.txn, DdlStatement::CreateTable(schema))
                .await?;
        }
        Ok(())
    }

    pub async fn is_installed(&self) -> bool {
        for table in [NAMESPACE_TABLE, ENTITY_TABLE, FIELD_TABLE] {
            if !self.storage.table_exists(table).await {
                return false;
            }
        }
        true
    }

    async fn scan<R: CatalogRow>(&self) -> Result<Vec<R>> {
        let rows = self.storage.scan_table(R::TABLE).await.map_err(|err| match err {
            DynamoError::TableNotFound(table) => {
                DynamoError::CatalogUnavailable(format!("system table '{}' is missing", table))
            }
            other => other,
        })?;
        rows.iter()
            .map(|(id, row)| R::from_row(*id, row))
            .collect()
    }

    async fn insert<R: CatalogRow>(&self, record: &R, key: &str) -> Result<RowId> {
        self.storage
            .insert_row(self.txn, R::TABLE, record.to_row())
            .await
            .map_err(|err| duplicate_or(err, key))
    }

    async fn update<R: CatalogRow>(&self, id: RowId, record: &R, key: &str) -> Result<()> {
        self.storage
            .update_row(self.txn, R::TABLE, id, record.to_row())
            .await
            .map_err(|err| duplicate_or(err, key))
    }

    // ------------------------------------------------------------------
    // Namespaces
    // ------------------------------------------------------------------

    /// All namespaces, ordered by name.
    pub async fn namespaces(&self) -> Result<Vec<NamespaceRecord>> {
        let mut namespaces: Vec<NamespaceRecord> = self.scan().await?;
        namespaces.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(namespaces)
    }

    pub async fn namespace(&self, name: &str) -> Result<Option<NamespaceRecord>> {
        Ok(self
            .scan::<NamespaceRecord>()
            .await?
            .into_iter()
            .find(|ns| ns.name == name))
    }

    pub async fn require_namespace(&self, name: &str) -> Result<NamespaceRecord> {
        self.namespace(name)
            .await?
            .ok_or_else(|| DynamoError::NamespaceNotFound(name.to_string()))
    }

    pub async fn insert_namespace(&self, def: &NamespaceDef) -> Result<NamespaceRecord> {
        let mut record = NamespaceRecord {
            id: 0,
            name: def.name.clone(),
            label: def.label.clone(),
        };
        record.id = self.insert(&record, &format!("namespace '{}'", def.name)).await?;
        Ok(record)
    }

    pub async fn update_namespace(&self, record: &NamespaceRecord) -> Result<()> {
        self.update(record.id, record, &format!("namespace '{}'", record.name))
            .await
    }

    pub async fn delete_namespace(&self, id: RowId) -> Result<bool> {
        self.storage.delete_row(self.txn, NAMESPACE_TABLE, id).await
    }

    // ------------------------------------------------------------------
    // Entities
    // ------------------------------------------------------------------

    /// Entities of one namespace, ordered by name.
    pub async fn entities_in(&self, namespace_id: RowId) -> Result<Vec<EntityRecord>> {
        let mut entities: Vec<EntityRecord> = self
            .scan::<EntityRecord>()
            .await?
            .into_iter()
            .filter(|e| e.namespace_id == namespace_id)
            .collect();
        entities.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entities)
    }

    pub async fn entity(&self, namespace_id: RowId, name: &str) -> Result<Option<EntityRecord>> {
        Ok(self
            .scan::<EntityRecord>()
            .await?
            .into_iter()
            .find(|e| e.namespace_id == namespace_id && e.name == name))
    }

    /// Resolve `(namespace, name)` to both records.
    pub async fn require_entity(&self, key: &EntityKey) -> Result<(NamespaceRecord, EntityRecord)> {
        let namespace = self.require_namespace(&key.namespace).await?;
        let entity = self
            .entity(namespace.id, &key.name)
            .await?
            .ok_or_else(|| DynamoError::EntityNotFound(key.namespace.clone(), key.name.clone()))?;
        Ok((namespace, entity))
    }

    pub async fn insert_entity(&self, namespace_id: RowId, def: &EntityDef) -> Result<EntityRecord> {
        let mut record = EntityRecord {
            id: 0,
            namespace_id,
            name: def.name.clone(),
            label: def.label.clone(),
        };
        record.id = self.insert(&record, &format!("entity '{}'", def.key())).await?;
        Ok(record)
    }

    pub async fn update_entity(&self, record: &EntityRecord) -> Result<()> {
        self.update(record.id, record, &format!("entity '{}'", record.name))
            .await
    }

    pub async fn delete_entity(&self, id: RowId) -> Result<bool> {
        self.storage.delete_row(self.txn, ENTITY_TABLE, id).await
    }

    // ------------------------------------------------------------------
    // Fields
    // ------------------------------------------------------------------

    /// Fields of one entity, ordered by id.
    pub async fn fields_of(&self, entity_id: RowId) -> Result<Vec<FieldRecord>> {
        let mut fields: Vec<FieldRecord> = self
            .scan::<FieldRecord>()
            .await?
            .into_iter()
            .filter(|f| f.entity_id == entity_id)
            .collect();
        fields.sort_by_key(|f| f.id);
        Ok(fields)
    }

    pub async fn field(&self, entity_id: RowId, name: &str) -> Result<Option<FieldRecord>> {
        Ok(self
            .fields_of(entity_id)
            .await?
            .into_iter()
            .find(|f| f.name == name))
    }

    pub async fn insert_field(&self, entity_id: RowId, def: &FieldDef) -> Result<FieldRecord> {
        let mut record = FieldRecord {
            id: 0,
            entity_id,
            name: def.name.clone(),
            label: def.label.clone(),
            field_type: def.field_type.clone(),
            nullable: def.nullable,
            blank: def.blank,
            unique: def.unique,
            default: def.default.clone(),
            help_text: def.help_text.clone(),
        };
        let key = format!("field '{}' on '{}'", def.name, def.entity_key());
        record.id = self.insert(&record, &key).await?;
        Ok(record)
    }

    pub async fn update_field(&self, record: &FieldRecord) -> Result<()> {
        self.update(record.id, record, &format!("field '{}'", record.name))
            .await
    }

    pub async fn delete_field(&self, id: RowId) -> Result<bool> {
        self.storage.delete_row(self.txn, FIELD_TABLE, id).await
    }

    /// Everything synthesis needs to know about one entity.
    pub async fn snapshot(&self, key: &EntityKey) -> Result<EntitySnapshot> {
        let (namespace, entity) = self.require_entity(key).await?;
        let fields = self.fields_of(entity.id).await?;
        let siblings = self.entities_in(namespace.id).await?;
        Ok(EntitySnapshot {
            namespace,
            entity,
            fields,
            siblings,
        })
    }
}

fn duplicate_or(err: DynamoError, key: &str) -> DynamoError {
    match err {
        DynamoError::ConstraintViolation(reason) if reason.starts_with("Unique constraint") => {
            DynamoError::DuplicateDefinition(format!("{} already exists", key))
        }
        other => other,
    }
}
