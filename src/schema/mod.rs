pub mod mutator;

pub use mutator::{AlterOutcome, SchemaMutator};
