use thiserror::Error;

#[derive(Error, Debug)]
pub enum DynamoError {
    #[error("Duplicate definition: {0}")]
    DuplicateDefinition(String),

    #[error("Field '{field}' has unresolvable type '{tag}'")]
    UnresolvableFieldType { field: String, tag: String },

    #[error("Schema mutation '{operation}' on table '{table}' failed: {source}")]
    SchemaMutationFailure {
        table: String,
        operation: &'static str,
        #[source]
        source: Box<DynamoError>,
    },

    #[error("Catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("Invalid name '{0}': {1}")]
    InvalidName(String, String),

    #[error("Invalid default '{value}' for field '{field}': {reason}")]
    InvalidDefault {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Namespace '{0}' not found")]
    NamespaceNotFound(String),

    #[error("Namespace '{0}' still has entities")]
    NamespaceNotEmpty(String),

    #[error("Entity '{0}.{1}' not found")]
    EntityNotFound(String, String),

    #[error("Field '{0}' not found on entity '{1}'")]
    FieldNotFound(String, String),

    #[error("Table '{0}' already exists")]
    TableExists(String),

    #[error("Table '{0}' not found")]
    TableNotFound(String),

    #[error("Column '{0}' already exists in table '{1}'")]
    ColumnExists(String, String),

    #[error("Column '{0}' not found in table '{1}'")]
    ColumnNotFound(String, String),

    #[error("Row {0} not found in table '{1}'")]
    RowNotFound(u64, String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Transaction error: {0}")]
    TransactionError(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl DynamoError {
    /// Wraps a storage failure raised while applying DDL.
    pub fn schema_mutation(table: &str, operation: &'static str, source: DynamoError) -> Self {
        Self::SchemaMutationFailure {
            table: table.to_string(),
            operation,
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, DynamoError>;

impl From<std::io::Error> for DynamoError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for DynamoError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}
