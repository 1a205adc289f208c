use crate::core::{DynamoError, Result};
use crate::fields::ColumnSpec;
use crate::storage::{DdlStatement, StorageEngine};
use crate::synth::SynthesizedType;
use crate::transaction::TransactionId;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of the alter-column hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlterOutcome {
    /// Old and new spec map to the same physical column.
    Unchanged,
    /// The physical column differs from the new spec and was left as is.
    Deferred,
}

/// Applies physical table and column changes for definition lifecycle events.
///
/// Callers run these inside the transaction that writes the owning
/// definition row, so a rejected statement rolls the row back too.
#[derive(Clone)]
pub struct SchemaMutator {
    storage: Arc<dyn StorageEngine>,
    txn: Option<TransactionId>,
}

impl SchemaMutator {
    pub fn new(storage: Arc<dyn StorageEngine>) -> Self {
        Self { storage, txn: None }
    }

    /// A mutator whose statements join `txn`.
    pub fn in_unit(&self, txn: TransactionId) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            txn: Some(txn),
        }
    }

    async fn apply(&self, stmt: DdlStatement) -> Result<()> {
        let table = stmt.table().to_string();
        let operation = stmt.operation();
        info!("{}", stmt);
        self.storage
            .execute_ddl(self.txn, stmt)
            .await
            .map_err(|err| DynamoError::schema_mutation(&table, operation, err))
    }

    /// Create the physical table for a newly defined entity. Fails if it exists.
    pub async fn create_table(&self, ty: &SynthesizedType) -> Result<()> {
        self.apply(DdlStatement::CreateTable(ty.table_schema())).await
    }

    /// Add the column for a newly defined field.
    ///
    /// The column is declared without its default; existing rows read NULL.
    pub async fn add_column(&self, table: &str, field: &str, spec: &ColumnSpec) -> Result<()> {
        let mut column = spec.physical_column();
        column.name = field.to_string();
        self.apply(DdlStatement::AddColumn {
            table: table.to_string(),
            column,
        })
        .await
    }

    pub async fn drop_column(&self, table: &str, field: &str) -> Result<()> {
        self.apply(DdlStatement::DropColumn {
            table: table.to_string(),
            column: field.to_string(),
        })
        .await
    }

    pub async fn drop_table(&self, table: &str) -> Result<()> {
        self.apply(DdlStatement::DropTable {
            table: table.to_string(),
        })
        .await
    }

    /// Hook for attribute changes on an existing field.
    ///
    /// Physical columns are never altered in place; a shape change is
    /// reported as [`AlterOutcome::Deferred`].
    pub async fn alter_column(
        &self,
        table: &str,
        field: &str,
        old: &ColumnSpec,
        new: &ColumnSpec,
    ) -> Result<AlterOutcome> {
        if old.same_physical_shape(new) {
            return Ok(AlterOutcome::Unchanged);
        }
        warn!(
            "Column {}.{} changed from {} to {}; physical column left unaltered",
            table,
            field,
            old.physical_column().to_sql(),
            new.physical_column().to_sql()
        );
        Ok(AlterOutcome::Deferred)
    }
}
