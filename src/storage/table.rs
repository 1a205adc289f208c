use crate::core::{Column, DynamoError, Result, Row, RowId, Schema, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    schema: TableSchema,
    rows: BTreeMap<RowId, Row>,
    next_row_id: RowId,
}

impl Table {
    pub fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            rows: BTreeMap::new(),
            next_row_id: 1,
        }
    }

    pub fn name(&self) -> &str {
        self.schema.name()
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn insert(&mut self, row: Row) -> Result<RowId> {
        self.validate_row(&row)?;
        self.check_uniqueness(&row, None)?;

        let id = self.next_row_id;
        self.next_row_id += 1;
        self.rows.insert(id, row);
        Ok(id)
    }

    /// Replaces a row, returning the previous version.
    pub fn update(&mut self, id: RowId, row: Row) -> Result<Row> {
        if !self.rows.contains_key(&id) {
            return Err(DynamoError::RowNotFound(id, self.name().to_string()));
        }
        self.validate_row(&row)?;
        self.check_uniqueness(&row, Some(id))?;

        let old = self
            .rows
            .insert(id, row)
            .ok_or_else(|| DynamoError::RowNotFound(id, self.schema.name.clone()))?;
        Ok(old)
    }

    pub fn delete(&mut self, id: RowId) -> Option<Row> {
        self.rows.remove(&id)
    }

    /// Puts a row back under a known id without re-validating it.
    pub(crate) fn restore_row(&mut self, id: RowId, row: Row) {
        self.next_row_id = self.next_row_id.max(id + 1);
        self.rows.insert(id, row);
    }

    pub fn get(&self, id: RowId) -> Option<&Row> {
        self.rows.get(&id)
    }

    pub fn scan(&self) -> Vec<(RowId, Row)> {
        self.rows
            .iter()
            .map(|(id, row)| (*id, row.clone()))
            .collect()
    }

    /// Appends a column; existing rows receive NULL.
    pub fn add_column(&mut self, column: Column) -> Result<()> {
        if self.schema.schema.get_column(&column.name).is_some() {
            return Err(DynamoError::ColumnExists(
                column.name,
                self.schema.name.clone(),
            ));
        }
        if !column.nullable && !self.rows.is_empty() {
            return Err(DynamoError::ConstraintViolation(format!(
                "Cannot add NOT NULL column '{}' without a default to non-empty table '{}'",
                column.name, self.schema.name
            )));
        }

        for row in self.rows.values_mut() {
            row.push(Value::Null);
        }
        self.schema.schema.push(column);
        Ok(())
    }

    /// Removes a column, returning its position, definition and the values it held.
    pub fn drop_column(&mut self, name: &str) -> Result<(usize, Column, Vec<(RowId, Value)>)> {
        let index = self
            .schema
            .schema
            .find_column_index(name)
            .ok_or_else(|| DynamoError::ColumnNotFound(name.to_string(), self.schema.name.clone()))?;

        if self
            .schema
            .unique_together
            .iter()
            .any(|group| group.iter().any(|col| col == name))
        {
            return Err(DynamoError::ConstraintViolation(format!(
                "Column '{}' is part of a composite unique key on '{}'",
                name, self.schema.name
            )));
        }

        let values = self
            .rows
            .iter_mut()
            .map(|(id, row)| (*id, row.remove(index)))
            .collect();
        let column = self.schema.schema.remove(index);
        Ok((index, column, values))
    }

    pub(crate) fn restore_column(&mut self, index: usize, column: Column, values: Vec<(RowId, Value)>) {
        let mut values: BTreeMap<RowId, Value> = values.into_iter().collect();
        for (id, row) in self.rows.iter_mut() {
            let value = values.remove(id).unwrap_or(Value::Null);
            row.insert(index.min(row.len()), value);
        }
        self.schema.schema.insert(index, column);
    }

    pub(crate) fn remove_column_unchecked(&mut self, name: &str) {
        if let Some(index) = self.schema.schema.find_column_index(name) {
            for row in self.rows.values_mut() {
                row.remove(index);
            }
            self.schema.schema.remove(index);
        }
    }

    fn validate_row(&self, row: &Row) -> Result<()> {
        let columns = self.schema.schema.columns();
        if row.len() != columns.len() {
            return Err(DynamoError::ConstraintViolation(format!(
                "Table '{}' expects {} columns, got {}",
                self.schema.name,
                columns.len(),
                row.len()
            )));
        }
        for (column, value) in columns.iter().zip(row.iter()) {
            column.validate(value)?;
        }
        Ok(())
    }

    fn check_uniqueness(&self, row: &Row, ignore_id: Option<RowId>) -> Result<()> {
        let others = || {
            self.rows
                .iter()
                .filter(move |(id, _)| Some(**id) != ignore_id)
                .map(|(_, existing)| existing)
        };

        for (col_idx, column) in self.schema.schema.columns().iter().enumerate() {
            if !column.unique || row[col_idx].is_null() {
                continue;
            }
            if others().any(|existing| existing[col_idx] == row[col_idx]) {
                return Err(DynamoError::ConstraintViolation(format!(
                    "Unique constraint violation: Column '{}' already contains value {}",
                    column.name, row[col_idx]
                )));
            }
        }

        for group in &self.schema.unique_together {
            let indexes: Vec<usize> = group
                .iter()
                .filter_map(|name| self.schema.schema.find_column_index(name))
                .collect();
            if indexes.iter().any(|idx| row[*idx].is_null()) {
                continue;
            }
            if others().any(|existing| indexes.iter().all(|idx| existing[*idx] == row[*idx])) {
                return Err(DynamoError::ConstraintViolation(format!(
                    "Unique constraint violation: ({}) already contains ({})",
                    group.join(", "),
                    indexes
                        .iter()
                        .map(|idx| row[*idx].to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    name: String,
    schema: Schema,
    unique_together: Vec<Vec<String>>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            schema: Schema::new(columns),
            unique_together: Vec::new(),
        }
    }

    /// Adds a composite unique constraint over the named columns.
    pub fn with_unique_together<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unique_together
            .push(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn unique_together(&self) -> &[Vec<String>] {
        &self.unique_together
    }

    pub fn to_create_sql(&self) -> String {
        let mut parts: Vec<String> = self.schema.columns().iter().map(Column::to_sql).collect();
        for group in &self.unique_together {
            parts.push(format!("UNIQUE ({})", group.join(", ")));
        }
        format!("CREATE TABLE {} ({})", self.name, parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DataType;

    fn people() -> Table {
        Table::new(
            TableSchema::new(
                "people",
                vec![
                    Column::new("first", DataType::Text).not_null(),
                    Column::new("last", DataType::Text),
                    Column::new("email", DataType::Text).unique(true),
                ],
            )
            .with_unique_together(["first", "last"]),
        )
    }

    #[test]
    fn test_insert_assigns_increasing_ids() {
        let mut table = people();
        let a = table
            .insert(vec!["Ada".into(), "Lovelace".into(), Value::Null])
            .unwrap();
        let b = table
            .insert(vec!["Alan".into(), "Turing".into(), Value::Null])
            .unwrap();
        assert!(b > a);
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn test_unique_together_rejects_duplicate_pair() {
        let mut table = people();
        table
            .insert(vec!["Ada".into(), "Lovelace".into(), Value::Null])
            .unwrap();
        let err = table
            .insert(vec!["Ada".into(), "Lovelace".into(), Value::Null])
            .unwrap_err();
        assert!(matches!(err, DynamoError::ConstraintViolation(_)));
        table
            .insert(vec!["Ada".into(), "Byron".into(), Value::Null])
            .unwrap();
    }

    #[test]
    fn test_unique_column_ignores_nulls_and_self() {
        let mut table = people();
        let id = table
            .insert(vec!["a".into(), Value::Null, "a@x".into()])
            .unwrap();
        table.insert(vec!["b".into(), Value::Null, Value::Null]).unwrap();
        table.insert(vec!["c".into(), Value::Null, Value::Null]).unwrap();
        table
            .update(id, vec!["a".into(), Value::Null, "a@x".into()])
            .unwrap();
        assert!(table.insert(vec!["d".into(), Value::Null, "a@x".into()]).is_err());
    }

    #[test]
    fn test_add_not_null_column_to_non_empty_table_fails() {
        let mut table = people();
        table.insert(vec!["a".into(), Value::Null, Value::Null]).unwrap();
        let err = table
            .add_column(Column::new("age", DataType::Integer).not_null())
            .unwrap_err();
        assert!(matches!(err, DynamoError::ConstraintViolation(_)));

        table.add_column(Column::new("age", DataType::Integer)).unwrap();
        assert_eq!(table.get(1).unwrap().len(), 4);
        assert_eq!(table.get(1).unwrap()[3], Value::Null);
    }

    #[test]
    fn test_drop_and_restore_column() {
        let mut table = people();
        table
            .insert(vec!["a".into(), Value::Null, "a@x".into()])
            .unwrap();

        let (index, column, values) = table.drop_column("email").unwrap();
        assert_eq!(table.schema().schema().column_count(), 2);

        table.restore_column(index, column, values);
        assert_eq!(table.get(1).unwrap()[2], Value::from("a@x"));
        assert!(table.drop_column("first").is_err());
    }

    #[test]
    fn test_create_sql() {
        let sql = people().schema().to_create_sql();
        assert_eq!(
            sql,
            "CREATE TABLE people (first TEXT NOT NULL, last TEXT, email TEXT UNIQUE, UNIQUE (first, last))"
        );
    }
}
