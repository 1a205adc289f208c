mod dynamo;
mod transactions;

pub use dynamo::{CreateTablesReport, Dynamo, Saved};
