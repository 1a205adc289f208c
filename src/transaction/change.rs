// ============================================================================
// Transaction Change Tracking
// ============================================================================
//
// Every mutation applied while a transaction is active records the
// information needed to reverse it. Rollback replays the log newest-first.
//
// ============================================================================

use crate::core::{Column, Row, RowId, Value};
use crate::storage::Table;

/// A single reversible change recorded in a transaction's undo log.
#[derive(Debug, Clone)]
pub enum Change {
    /// A row was inserted; undone by removing it.
    InsertRow { table: String, id: RowId },

    /// A row was replaced; undone by restoring `old_row`.
    UpdateRow {
        table: String,
        id: RowId,
        old_row: Row,
    },

    /// A row was removed; undone by re-inserting `old_row` under the same id.
    DeleteRow {
        table: String,
        id: RowId,
        old_row: Row,
    },

    /// A table was created; undone by dropping it.
    CreateTable { name: String },

    /// A table was dropped; undone by restoring the whole table.
    DropTable { table: Box<Table> },

    /// A column was appended; undone by removing it.
    AddColumn { table: String, column: String },

    /// A column was removed; undone by re-inserting it at `index` with its values.
    DropColumn {
        table: String,
        index: usize,
        column: Column,
        values: Vec<(RowId, Value)>,
    },
}

impl Change {
    /// Get the table name affected by this change
    pub fn table_name(&self) -> &str {
        match self {
            Change::InsertRow { table, .. } => table,
            Change::UpdateRow { table, .. } => table,
            Change::DeleteRow { table, .. } => table,
            Change::CreateTable { name } => name,
            Change::DropTable { table } => table.name(),
            Change::AddColumn { table, .. } => table,
            Change::DropColumn { table, .. } => table,
        }
    }

    /// Check if this is a DDL (Data Definition Language) change
    pub fn is_ddl(&self) -> bool {
        matches!(
            self,
            Change::CreateTable { .. }
                | Change::DropTable { .. }
                | Change::AddColumn { .. }
                | Change::DropColumn { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_table_name() {
        let change = Change::InsertRow {
            table: "blog__post".to_string(),
            id: 1,
        };
        assert_eq!(change.table_name(), "blog__post");
        assert!(!change.is_ddl());
    }

    #[test]
    fn test_change_classification() {
        let add = Change::AddColumn {
            table: "blog__post".to_string(),
            column: "title".to_string(),
        };
        assert!(add.is_ddl());
        assert_eq!(add.table_name(), "blog__post");
    }
}
