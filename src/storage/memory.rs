use super::engine::{DdlStatement, StorageEngine};
use super::{Table, TableSchema};
use crate::core::{DynamoError, Result, Row, RowId};
use crate::transaction::{Change, Transaction, TransactionId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;

type Tables = HashMap<String, Table>;

/// In-memory implementation of [`StorageEngine`].
///
/// One transaction may be open at a time. It holds the write gate until it
/// commits or rolls back, so writes made outside it wait instead of landing
/// in its undo log.
pub struct InMemoryStorage {
    tables: RwLock<Tables>,
    transaction: Mutex<Option<OpenTransaction>>,
    write_gate: Arc<Mutex<()>>,
}

struct OpenTransaction {
    log: Transaction,
    _gate: OwnedMutexGuard<()>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            transaction: Mutex::new(None),
            write_gate: Arc::new(Mutex::new(())),
        }
    }

    /// Number of rows currently in `table`.
    pub async fn row_count(&self, table: &str) -> Result<usize> {
        let tables = self.tables.read().await;
        tables
            .get(table)
            .map(Table::row_count)
            .ok_or_else(|| DynamoError::TableNotFound(table.to_string()))
    }

    /// Whether a transaction is currently open.
    pub async fn in_transaction(&self) -> bool {
        self.transaction.lock().await.is_some()
    }

    /// Run one mutation, recording its undo entry when it belongs to `txn`.
    async fn write<T, F>(&self, txn: Option<TransactionId>, apply: F) -> Result<T>
    where
        T: Send,
        F: FnOnce(&mut Tables) -> Result<(T, Option<Change>)> + Send,
    {
        match txn {
            None => {
                let _gate = self.write_gate.lock().await;
                let mut tables = self.tables.write().await;
                apply(&mut tables).map(|(value, _)| value)
            }
            Some(id) => {
                let mut slot = self.transaction.lock().await;
                let open = open_mut(&mut slot, id)?;
                let mut tables = self.tables.write().await;
                let (value, change) = apply(&mut tables)?;
                if let Some(change) = change {
                    open.log.record(change);
                }
                Ok(value)
            }
        }
    }

    async fn take_open(&self, id: TransactionId) -> Result<OpenTransaction> {
        let mut slot = self.transaction.lock().await;
        open_mut(&mut slot, id)?;
        slot.take()
            .ok_or_else(|| DynamoError::TransactionError(format!("{} is not active", id)))
    }

    fn undo(tables: &mut Tables, change: Change) {
        debug!("Undoing change on {}", change.table_name());
        match change {
            Change::InsertRow { table, id } => {
                if let Some(t) = tables.get_mut(&table) {
                    t.delete(id);
                }
            }
            Change::UpdateRow { table, id, old_row } | Change::DeleteRow { table, id, old_row } => {
                if let Some(t) = tables.get_mut(&table) {
                    t.restore_row(id, old_row);
                }
            }
            Change::CreateTable { name } => {
                tables.remove(&name);
            }
            Change::DropTable { table } => {
                tables.insert(table.name().to_string(), *table);
            }
            Change::AddColumn { table, column } => {
                if let Some(t) = tables.get_mut(&table) {
                    t.remove_column_unchecked(&column);
                }
            }
            Change::DropColumn {
                table,
                index,
                column,
                values,
            } => {
                if let Some(t) = tables.get_mut(&table) {
                    t.restore_column(index, column, values);
                }
            }
        }
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

fn open_mut(slot: &mut Option<OpenTransaction>, id: TransactionId) -> Result<&mut OpenTransaction> {
    match slot.as_mut() {
        Some(open) if open.log.id() == id => Ok(open),
        Some(open) => Err(DynamoError::TransactionError(format!(
            "{} is not the active transaction ({} is)",
            id,
            open.log.id()
        ))),
        None => Err(DynamoError::TransactionError(format!("{} is not active", id))),
    }
}

fn table_mut<'a>(tables: &'a mut Tables, name: &str) -> Result<&'a mut Table> {
    tables
        .get_mut(name)
        .ok_or_else(|| DynamoError::TableNotFound(name.to_string()))
}

fn apply_ddl(tables: &mut Tables, stmt: DdlStatement) -> Result<Change> {
    let change = match stmt {
        DdlStatement::CreateTable(schema) => {
            let name = schema.name().to_string();
            if tables.contains_key(&name) {
                return Err(DynamoError::TableExists(name));
            }
            tables.insert(name.clone(), Table::new(schema));
            Change::CreateTable { name }
        }
        DdlStatement::DropTable { table } => {
            let dropped = tables
                .remove(&table)
                .ok_or_else(|| DynamoError::TableNotFound(table.clone()))?;
            Change::DropTable {
                table: Box::new(dropped),
            }
        }
        DdlStatement::AddColumn { table, column } => {
            let name = column.name.clone();
            table_mut(tables, &table)?.add_column(column)?;
            Change::AddColumn {
                table,
                column: name,
            }
        }
        DdlStatement::DropColumn { table, column } => {
            let (index, column, values) = table_mut(tables, &table)?.drop_column(&column)?;
            Change::DropColumn {
                table,
                index,
                column,
                values,
            }
        }
    };
    Ok(change)
}

#[async_trait]
impl StorageEngine for InMemoryStorage {
    async fn execute_ddl(&self, txn: Option<TransactionId>, stmt: DdlStatement) -> Result<()> {
        debug!("Executing DDL: {}", stmt);
        self.write(txn, move |tables| {
            apply_ddl(tables, stmt).map(|change| ((), Some(change)))
        })
        .await
    }

    async fn table_exists(&self, name: &str) -> bool {
        self.tables.read().await.contains_key(name)
    }

    async fn get_schema(&self, table: &str) -> Result<TableSchema> {
        let tables = self.tables.read().await;
        tables
            .get(table)
            .map(|t| t.schema().clone())
            .ok_or_else(|| DynamoError::TableNotFound(table.to_string()))
    }

    async fn list_tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    async fn insert_row(&self, txn: Option<TransactionId>, table: &str, row: Row) -> Result<RowId> {
        let table = table.to_string();
        self.write(txn, move |tables| {
            let id = table_mut(tables, &table)?.insert(row)?;
            Ok((id, Some(Change::InsertRow { table, id })))
        })
        .await
    }

    async fn update_row(
        &self,
        txn: Option<TransactionId>,
        table: &str,
        id: RowId,
        row: Row,
    ) -> Result<()> {
        let table = table.to_string();
        self.write(txn, move |tables| {
            let old_row = table_mut(tables, &table)?.update(id, row)?;
            Ok(((), Some(Change::UpdateRow { table, id, old_row })))
        })
        .await
    }

    async fn delete_row(&self, txn: Option<TransactionId>, table: &str, id: RowId) -> Result<bool> {
        let table = table.to_string();
        self.write(txn, move |tables| {
            Ok(match table_mut(tables, &table)?.delete(id) {
                Some(old_row) => (true, Some(Change::DeleteRow { table, id, old_row })),
                None => (false, None),
            })
        })
        .await
    }

    async fn get_row(&self, table: &str, id: RowId) -> Result<Option<Row>> {
        let tables = self.tables.read().await;
        let t = tables
            .get(table)
            .ok_or_else(|| DynamoError::TableNotFound(table.to_string()))?;
        Ok(t.get(id).cloned())
    }

    async fn scan_table(&self, table: &str) -> Result<Vec<(RowId, Row)>> {
        let tables = self.tables.read().await;
        tables
            .get(table)
            .map(Table::scan)
            .ok_or_else(|| DynamoError::TableNotFound(table.to_string()))
    }

    async fn begin(&self) -> Result<TransactionId> {
        let gate = Arc::clone(&self.write_gate).lock_owned().await;
        let mut slot = self.transaction.lock().await;
        if let Some(open) = slot.as_ref() {
            return Err(DynamoError::TransactionError(format!(
                "{} is already active",
                open.log.id()
            )));
        }
        let id = TransactionId::new();
        *slot = Some(OpenTransaction {
            log: Transaction::new(id),
            _gate: gate,
        });
        debug!("Began {}", id);
        Ok(id)
    }

    async fn commit(&self, txn: TransactionId) -> Result<()> {
        let open = self.take_open(txn).await?;
        debug!(
            "Committed {} ({} changes, {} DDL)",
            txn,
            open.log.changes().len(),
            open.log.ddl_count()
        );
        Ok(())
    }

    async fn rollback(&self, txn: TransactionId) -> Result<()> {
        let open = self.take_open(txn).await?;
        debug!(
            "Rolling back {} ({} changes, {} DDL)",
            txn,
            open.log.changes().len(),
            open.log.ddl_count()
        );
        let OpenTransaction { log, _gate } = open;
        let mut tables = self.tables.write().await;
        for change in log.into_undo() {
            Self::undo(&mut tables, change);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Column, DataType, Value};
    use std::time::Duration;

    fn posts() -> TableSchema {
        TableSchema::new("blog__post", vec![Column::new("title", DataType::Text)])
    }

    #[tokio::test]
    async fn test_create_table_twice_fails() {
        let storage = InMemoryStorage::new();
        storage
            .execute_ddl(None, DdlStatement::CreateTable(posts()))
            .await
            .unwrap();
        let err = storage
            .execute_ddl(None, DdlStatement::CreateTable(posts()))
            .await
            .unwrap_err();
        assert!(matches!(err, DynamoError::TableExists(_)));
    }

    #[tokio::test]
    async fn test_rollback_reverts_ddl_and_rows() {
        let storage = InMemoryStorage::new();
        storage
            .execute_ddl(None, DdlStatement::CreateTable(posts()))
            .await
            .unwrap();
        storage
            .insert_row(None, "blog__post", vec!["keep".into()])
            .await
            .unwrap();

        let txn = storage.begin().await.unwrap();
        storage
            .execute_ddl(
                Some(txn),
                DdlStatement::AddColumn {
                    table: "blog__post".into(),
                    column: Column::new("body", DataType::Text),
                },
            )
            .await
            .unwrap();
        storage
            .insert_row(Some(txn), "blog__post", vec!["new".into(), "text".into()])
            .await
            .unwrap();
        storage
            .execute_ddl(
                Some(txn),
                DdlStatement::DropColumn {
                    table: "blog__post".into(),
                    column: "title".into(),
                },
            )
            .await
            .unwrap();
        storage.rollback(txn).await.unwrap();

        let schema = storage.get_schema("blog__post").await.unwrap();
        assert_eq!(schema.schema().column_count(), 1);
        assert_eq!(schema.schema().columns()[0].name, "title");
        let rows = storage.scan_table("blog__post").await.unwrap();
        assert_eq!(rows, vec![(1, vec![Value::from("keep")])]);
    }

    #[tokio::test]
    async fn test_commit_keeps_changes() {
        let storage = InMemoryStorage::new();
        let txn = storage.begin().await.unwrap();
        storage
            .execute_ddl(Some(txn), DdlStatement::CreateTable(posts()))
            .await
            .unwrap();
        storage.commit(txn).await.unwrap();

        assert!(storage.table_exists("blog__post").await);
        assert!(!storage.in_transaction().await);
        assert!(storage.rollback(txn).await.is_err());
    }

    #[tokio::test]
    async fn test_write_with_stale_transaction_is_rejected() {
        let storage = InMemoryStorage::new();
        let txn = storage.begin().await.unwrap();
        storage.commit(txn).await.unwrap();

        let err = storage
            .execute_ddl(Some(txn), DdlStatement::CreateTable(posts()))
            .await
            .unwrap_err();
        assert!(matches!(err, DynamoError::TransactionError(_)));
        assert!(!storage.table_exists("blog__post").await);
    }

    #[tokio::test]
    async fn test_second_begin_waits_for_the_first() {
        let storage = Arc::new(InMemoryStorage::new());
        let first = storage.begin().await.unwrap();

        let waiting = tokio::spawn({
            let storage = Arc::clone(&storage);
            async move { storage.begin().await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());

        storage.rollback(first).await.unwrap();
        let second = waiting.await.unwrap().unwrap();
        assert_ne!(first, second);
        storage.commit(second).await.unwrap();
    }

    #[tokio::test]
    async fn test_outside_write_survives_rollback() {
        let storage = Arc::new(InMemoryStorage::new());
        storage
            .execute_ddl(None, DdlStatement::CreateTable(posts()))
            .await
            .unwrap();
        let txn = storage.begin().await.unwrap();
        storage
            .insert_row(Some(txn), "blog__post", vec!["draft".into()])
            .await
            .unwrap();

        let outside = tokio::spawn({
            let storage = Arc::clone(&storage);
            async move {
                storage
                    .insert_row(None, "blog__post", vec!["published".into()])
                    .await
            }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!outside.is_finished());

        storage.rollback(txn).await.unwrap();
        outside.await.unwrap().unwrap();

        let rows = storage.scan_table("blog__post").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].1, vec![Value::from("published")]);
    }

    #[tokio::test]
    async fn test_rollback_restores_dropped_table() {
        let storage = InMemoryStorage::new();
        storage
            .execute_ddl(None, DdlStatement::CreateTable(posts()))
            .await
            .unwrap();
        storage
            .insert_row(None, "blog__post", vec!["a".into()])
            .await
            .unwrap();

        let txn = storage.begin().await.unwrap();
        storage
            .execute_ddl(
                Some(txn),
                DdlStatement::DropTable {
                    table: "blog__post".into(),
                },
            )
            .await
            .unwrap();
        assert!(!storage.table_exists("blog__post").await);
        storage.rollback(txn).await.unwrap();

        assert_eq!(storage.row_count("blog__post").await.unwrap(), 1);
    }
}
