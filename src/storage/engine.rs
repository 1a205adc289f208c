use super::table::TableSchema;
use crate::core::{Column, Result, Row, RowId};
use crate::transaction::TransactionId;
use async_trait::async_trait;
use std::fmt;

/// Schema-altering statement accepted by [`StorageEngine::execute_ddl`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DdlStatement {
    CreateTable(TableSchema),
    DropTable { table: String },
    AddColumn { table: String, column: Column },
    DropColumn { table: String, column: String },
}

impl DdlStatement {
    pub fn table(&self) -> &str {
        match self {
            Self::CreateTable(schema) => schema.name(),
            Self::DropTable { table }
            | Self::AddColumn { table, .. }
            | Self::DropColumn { table, .. } => table,
        }
    }

    pub fn operation(&self) -> &'static str {
        match self {
            Self::CreateTable(_) => "create_table",
            Self::DropTable { .. } => "drop_table",
            Self::AddColumn { .. } => "add_column",
            Self::DropColumn { .. } => "drop_column",
        }
    }
}

impl fmt::Display for DdlStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateTable(schema) => write!(f, "{}", schema.to_create_sql()),
            Self::DropTable { table } => write!(f, "DROP TABLE {}", table),
            Self::AddColumn { table, column } => {
                write!(f, "ALTER TABLE {} ADD COLUMN {}", table, column.to_sql())
            }
            Self::DropColumn { table, column } => {
                write!(f, "ALTER TABLE {} DROP COLUMN {}", table, column)
            }
        }
    }
}

/// Storage engine trait - allows pluggable storage backends
///
/// Every write names the transaction it belongs to. Writes passing
/// `Some(txn)` are undone together by [`rollback`](Self::rollback); writes
/// passing `None` apply on their own and must not be reverted by a
/// transaction they were not part of. Reads see uncommitted data.
#[async_trait]
pub trait StorageEngine: Send + Sync {
    /// Apply a schema-altering statement
    async fn execute_ddl(&self, txn: Option<TransactionId>, stmt: DdlStatement) -> Result<()>;

    /// Check if a table exists
    async fn table_exists(&self, name: &str) -> bool;

    /// Get the schema for a table
    async fn get_schema(&self, table: &str) -> Result<TableSchema>;

    /// List all table names, sorted
    async fn list_tables(&self) -> Vec<String>;

    /// Insert a row, returning its store-assigned id
    async fn insert_row(&self, txn: Option<TransactionId>, table: &str, row: Row)
        -> Result<RowId>;

    /// Replace an existing row
    async fn update_row(
        &self,
        txn: Option<TransactionId>,
        table: &str,
        id: RowId,
        row: Row,
    ) -> Result<()>;

    /// Delete a row; `false` when it did not exist
    async fn delete_row(&self, txn: Option<TransactionId>, table: &str, id: RowId) -> Result<bool>;

    async fn get_row(&self, table: &str, id: RowId) -> Result<Option<Row>>;

    /// Scan all rows in id order
    async fn scan_table(&self, table: &str) -> Result<Vec<(RowId, Row)>>;

    /// Open a transaction. Waits while another one is open; writes made
    /// without a transaction wait for it the same way.
    async fn begin(&self) -> Result<TransactionId>;

    async fn commit(&self, txn: TransactionId) -> Result<()>;

    async fn rollback(&self, txn: TransactionId) -> Result<()>;
}
