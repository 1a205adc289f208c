use crate::core::{DynamoError, Result, Row, RowId, Value};
use crate::storage::{StorageEngine, TableSchema};
use crate::synth::{FieldDescriptor, SynthesizedType};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One row of a synthesized type, addressed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EntityInstance {
    pub id: Option<RowId>,
    values: BTreeMap<String, Value>,
}

impl EntityInstance {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }
}

/// Generic CRUD over the physical table of one synthesized type.
///
/// Values are laid out by the physical schema, so a field whose column
/// shape was never altered still maps by name.
#[derive(Clone)]
pub struct TypeHandle {
    ty: Arc<SynthesizedType>,
    storage: Arc<dyn StorageEngine>,
}

impl TypeHandle {
    pub fn new(ty: Arc<SynthesizedType>, storage: Arc<dyn StorageEngine>) -> Self {
        Self { ty, storage }
    }

    pub fn synthesized_type(&self) -> &Arc<SynthesizedType> {
        &self.ty
    }

    pub fn display_label(&self, instance: &EntityInstance) -> String {
        self.ty.display_label(instance)
    }

    pub async fn insert(&self, instance: &EntityInstance) -> Result<RowId> {
        self.reject_unknown_fields(instance)?;
        let schema = self.storage.get_schema(&self.ty.table_name).await?;
        let row = self.build_row(&schema, instance, None).await?;
        self.storage.insert_row(None, &self.ty.table_name, row).await
    }

    /// Overwrite the fields present in `instance`; the rest keep their values.
    pub async fn update(&self, id: RowId, instance: &EntityInstance) -> Result<()> {
        self.reject_unknown_fields(instance)?;
        let schema = self.storage.get_schema(&self.ty.table_name).await?;
        let current = self
            .storage
            .get_row(&self.ty.table_name, id)
            .await?
            .ok_or_else(|| DynamoError::RowNotFound(id, self.ty.table_name.clone()))?;
        let row = self.build_row(&schema, instance, Some(&current)).await?;
        self.storage.update_row(None, &self.ty.table_name, id, row).await
    }

    pub async fn delete(&self, id: RowId) -> Result<bool> {
        self.storage.delete_row(None, &self.ty.table_name, id).await
    }

    pub async fn get(&self, id: RowId) -> Result<Option<EntityInstance>> {
        let schema = self.storage.get_schema(&self.ty.table_name).await?;
        Ok(self
            .storage
            .get_row(&self.ty.table_name, id)
            .await?
            .map(|row| Self::decode(&schema, id, row)))
    }

    /// Every instance, ordered by id.
    pub async fn all(&self) -> Result<Vec<EntityInstance>> {
        let schema = self.storage.get_schema(&self.ty.table_name).await?;
        Ok(self
            .storage
            .scan_table(&self.ty.table_name)
            .await?
            .into_iter()
            .map(|(id, row)| Self::decode(&schema, id, row))
            .collect())
    }

    fn reject_unknown_fields(&self, instance: &EntityInstance) -> Result<()> {
        match instance
            .values()
            .keys()
            .find(|name| self.ty.field(name).is_none())
        {
            Some(name) => Err(DynamoError::FieldNotFound(
                name.clone(),
                self.ty.key.to_string(),
            )),
            None => Ok(()),
        }
    }

    async fn build_row(
        &self,
        schema: &TableSchema,
        instance: &EntityInstance,
        current: Option<&Row>,
    ) -> Result<Row> {
        let mut row = Vec::with_capacity(schema.schema().column_count());
        for (idx, column) in schema.schema().columns().iter().enumerate() {
            let Some(field) = self.ty.field(&column.name) else {
                row.push(current.map(|r| r[idx].clone()).unwrap_or(Value::Null));
                continue;
            };
            let value = match (instance.get(&column.name), current) {
                (Some(value), _) => value.clone(),
                (None, Some(existing)) => existing[idx].clone(),
                (None, None) => field.column.default.clone().unwrap_or(Value::Null),
            };
            field.column.check(&value)?;
            self.check_reference(field, &value).await?;
            row.push(value);
        }
        Ok(row)
    }

    async fn check_reference(&self, field: &FieldDescriptor, value: &Value) -> Result<()> {
        let (Some(target), Some(id)) = (field.column.kind.reference_target(), value.as_i64())
        else {
            return Ok(());
        };
        let table = target.table_name();
        let exists = self.storage.get_row(&table, id as RowId).await?.is_some();
        if !exists {
            return Err(DynamoError::ConstraintViolation(format!(
                "Field '{}' references missing {} #{}",
                field.name(),
                target,
                id
            )));
        }
        Ok(())
    }

    fn decode(schema: &TableSchema, id: RowId, row: Row) -> EntityInstance {
        let mut instance = EntityInstance {
            id: Some(id),
            values: BTreeMap::new(),
        };
        for (column, value) in schema.schema().columns().iter().zip(row) {
            instance.values.insert(column.name.clone(), value);
        }
        instance
    }
}
