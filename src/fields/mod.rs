pub mod choices;
pub mod registry;
pub mod spec;

pub use choices::{BASIC_FIELDS_GROUP, Choice, ChoiceGroup, ChoiceSet, ChoiceSetProvider};
pub use registry::{BuiltinField, FieldAttributes, FieldSpecRegistry, LengthLimits};
pub use spec::{ColumnKind, ColumnSpec};
