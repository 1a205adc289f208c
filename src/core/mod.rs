pub mod error;
pub mod types;
pub mod value;

pub use error::{DynamoError, Result};
pub use types::{Column, Row, RowId, Schema};
pub use value::{DataType, Value};
