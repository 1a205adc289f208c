// ============================================================================
// Dynamo Library
// ============================================================================
//
// Runtime-defined entity types: namespaces, entities and fields live as
// catalog rows, are synthesized into typed descriptors on demand, and keep
// a physical table in step with every definition change.
//
// ============================================================================

pub mod catalog;
pub mod config;
pub mod core;
pub mod facade;
pub mod fields;
pub mod rows;
pub mod schema;
pub mod storage;
pub mod synth;
pub mod transaction;

pub use catalog::{EntityDef, EntityKey, FieldDef, NamespaceDef};
pub use config::{DynamoConfig, UnresolvedFieldPolicy};
pub use core::{DataType, DynamoError, Result, Value};
pub use facade::{CreateTablesReport, Dynamo, Saved};
pub use fields::{ChoiceSet, ColumnKind, ColumnSpec, FieldSpecRegistry};
pub use rows::{EntityInstance, TypeHandle};
pub use storage::{InMemoryStorage, StorageEngine};
pub use synth::{SynthesizedType, TypeSynthesizer};
