// ============================================================================
// Transaction Management Module
// ============================================================================
//
// Single-writer transactions for the in-memory store. DDL and row writes
// share one undo log so a failed column change never leaves a committed
// catalog row behind, and vice versa.
//
// ============================================================================

pub mod change;
pub mod state;

pub use change::Change;
pub use state::{Transaction, TransactionId};
