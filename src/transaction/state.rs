// ============================================================================
// Transaction State Management
// ============================================================================
//
// An open transaction owns an undo log. Every storage mutation made in it
// appends a reversible Change; commit discards the log, rollback replays it
// newest-first.
//
// ============================================================================

use super::Change;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global transaction ID counter
static NEXT_TXN_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Generate a new unique transaction ID
    pub fn new() -> Self {
        TransactionId(NEXT_TXN_ID.fetch_add(1, Ordering::SeqCst))
    }

    /// Get the raw ID value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "txn_{}", self.0)
    }
}

/// Undo log of one open transaction.
#[derive(Debug)]
pub struct Transaction {
    id: TransactionId,
    undo_log: Vec<Change>,
}

impl Transaction {
    pub fn new(id: TransactionId) -> Self {
        Self {
            id,
            undo_log: Vec::new(),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn record(&mut self, change: Change) {
        self.undo_log.push(change);
    }

    pub fn changes(&self) -> &[Change] {
        &self.undo_log
    }

    /// Number of recorded schema changes.
    pub fn ddl_count(&self) -> usize {
        self.undo_log.iter().filter(|c| c.is_ddl()).count()
    }

    /// Hands back the changes newest-first, ready to be undone.
    pub fn into_undo(self) -> Vec<Change> {
        let mut changes = self.undo_log;
        changes.reverse();
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_ids_are_unique() {
        let a = TransactionId::new();
        let b = TransactionId::new();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn test_rollback_returns_changes_newest_first() {
        let mut txn = Transaction::new(TransactionId::new());
        txn.record(Change::CreateTable { name: "a".into() });
        txn.record(Change::CreateTable { name: "b".into() });

        txn.record(Change::InsertRow {
            table: "b".into(),
            id: 1,
        });
        assert_eq!(txn.changes().len(), 3);
        assert_eq!(txn.ddl_count(), 2);

        let changes = txn.into_undo();
        assert!(!changes[0].is_ddl());
        assert_eq!(changes[1].table_name(), "b");
        assert_eq!(changes[2].table_name(), "a");
    }
}
