pub mod records;
pub mod store;
pub mod validation;

pub use records::{
    EntityDef, EntityKey, EntityRecord, FieldDef, FieldRecord, NamespaceDef, NamespaceRecord,
    TABLE_SEPARATOR,
};
pub use store::{CatalogStore, ENTITY_TABLE, FIELD_TABLE, NAMESPACE_TABLE};
