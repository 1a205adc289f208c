#![allow(dead_code)]

use async_trait::async_trait;
use dynamo::core::{Result, Row, RowId};
use dynamo::storage::{DdlStatement, TableSchema};
use dynamo::transaction::TransactionId;
use dynamo::{
    Dynamo, DynamoConfig, EntityDef, FieldDef, InMemoryStorage, NamespaceDef, StorageEngine,
};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Storage wrapper that logs every mutating call before delegating.
#[derive(Default)]
pub struct RecordingStorage {
    inner: InMemoryStorage,
    calls: Mutex<Vec<String>>,
}

impl RecordingStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }

    pub fn position(&self, call: &str) -> Option<usize> {
        self.calls().iter().position(|c| c == call)
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl StorageEngine for RecordingStorage {
    async fn execute_ddl(&self, txn: Option<TransactionId>, stmt: DdlStatement) -> Result<()> {
        self.log(format!("{} {}", stmt.operation(), stmt.table()));
        self.inner.execute_ddl(txn, stmt).await
    }

    async fn table_exists(&self, name: &str) -> bool {
        self.inner.table_exists(name).await
    }

    async fn get_schema(&self, table: &str) -> Result<TableSchema> {
        self.inner.get_schema(table).await
    }

    async fn list_tables(&self) -> Vec<String> {
        self.inner.list_tables().await
    }

    async fn insert_row(&self, txn: Option<TransactionId>, table: &str, row: Row) -> Result<RowId> {
        self.log(format!("insert_row {}", table));
        self.inner.insert_row(txn, table, row).await
    }

    async fn update_row(
        &self,
        txn: Option<TransactionId>,
        table: &str,
        id: RowId,
        row: Row,
    ) -> Result<()> {
        self.log(format!("update_row {}", table));
        self.inner.update_row(txn, table, id, row).await
    }

    async fn delete_row(&self, txn: Option<TransactionId>, table: &str, id: RowId) -> Result<bool> {
        self.log(format!("delete_row {}", table));
        self.inner.delete_row(txn, table, id).await
    }

    async fn get_row(&self, table: &str, id: RowId) -> Result<Option<Row>> {
        self.inner.get_row(table, id).await
    }

    async fn scan_table(&self, table: &str) -> Result<Vec<(RowId, Row)>> {
        self.inner.scan_table(table).await
    }

    async fn begin(&self) -> Result<TransactionId> {
        self.inner.begin().await
    }

    async fn commit(&self, txn: TransactionId) -> Result<()> {
        self.log("commit".to_string());
        self.inner.commit(txn).await
    }

    async fn rollback(&self, txn: TransactionId) -> Result<()> {
        self.log("rollback".to_string());
        self.inner.rollback(txn).await
    }
}

/// Storage wrapper that pauses one armed DDL statement until released, so a
/// test can act while a unit of work is in flight.
#[derive(Default)]
pub struct GatedStorage {
    inner: InMemoryStorage,
    armed: Mutex<Option<String>>,
    reached: Notify,
    release: Notify,
}

impl GatedStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pause the next statement rendered as `"{operation} {table}"`.
    pub fn arm(&self, call: &str) {
        *self.armed.lock().unwrap() = Some(call.to_string());
    }

    /// Wait until the armed statement is paused.
    pub async fn reached(&self) {
        self.reached.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }

    fn matches(&self, stmt: &DdlStatement) -> bool {
        let call = format!("{} {}", stmt.operation(), stmt.table());
        let mut armed = self.armed.lock().unwrap();
        if armed.as_deref() == Some(call.as_str()) {
            *armed = None;
            true
        } else {
            false
        }
    }
}

#[async_trait]
impl StorageEngine for GatedStorage {
    async fn execute_ddl(&self, txn: Option<TransactionId>, stmt: DdlStatement) -> Result<()> {
        if self.matches(&stmt) {
            self.reached.notify_one();
            self.release.notified().await;
        }
        self.inner.execute_ddl(txn, stmt).await
    }

    async fn table_exists(&self, name: &str) -> bool {
        self.inner.table_exists(name).await
    }

    async fn get_schema(&self, table: &str) -> Result<TableSchema> {
        self.inner.get_schema(table).await
    }

    async fn list_tables(&self) -> Vec<String> {
        self.inner.list_tables().await
    }

    async fn insert_row(&self, txn: Option<TransactionId>, table: &str, row: Row) -> Result<RowId> {
        self.inner.insert_row(txn, table, row).await
    }

    async fn update_row(
        &self,
        txn: Option<TransactionId>,
        table: &str,
        id: RowId,
        row: Row,
    ) -> Result<()> {
        self.inner.update_row(txn, table, id, row).await
    }

    async fn delete_row(&self, txn: Option<TransactionId>, table: &str, id: RowId) -> Result<bool> {
        self.inner.delete_row(txn, table, id).await
    }

    async fn get_row(&self, table: &str, id: RowId) -> Result<Option<Row>> {
        self.inner.get_row(table, id).await
    }

    async fn scan_table(&self, table: &str) -> Result<Vec<(RowId, Row)>> {
        self.inner.scan_table(table).await
    }

    async fn begin(&self) -> Result<TransactionId> {
        self.inner.begin().await
    }

    async fn commit(&self, txn: TransactionId) -> Result<()> {
        self.inner.commit(txn).await
    }

    async fn rollback(&self, txn: TransactionId) -> Result<()> {
        self.inner.rollback(txn).await
    }
}

pub async fn gated_dynamo() -> (Arc<Dynamo>, Arc<GatedStorage>) {
    let storage = Arc::new(GatedStorage::new());
    let dynamo = Dynamo::new(storage.clone(), DynamoConfig::default());
    dynamo.install().await.unwrap();
    (Arc::new(dynamo), storage)
}

pub async fn recording_dynamo() -> (Dynamo, Arc<RecordingStorage>) {
    let storage = Arc::new(RecordingStorage::new());
    let dynamo = Dynamo::new(storage.clone(), DynamoConfig::default());
    dynamo.install().await.unwrap();
    (dynamo, storage)
}

/// Namespace `blog` with an empty entity `post`.
pub async fn blog_post(dynamo: &Dynamo) {
    dynamo
        .save_namespace(NamespaceDef::new("blog", "Blog"))
        .await
        .unwrap();
    dynamo
        .save_entity(EntityDef::new("blog", "post", "Post"))
        .await
        .unwrap();
}

pub fn field(entity: &str, name: &str, tag: &str) -> FieldDef {
    FieldDef::new("blog", entity, name, tag)
}
