use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Decode error: column {column}: {message}")]
    Decode { column: usize, message: String },

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Unsupported query for this store: {0}")]
    Unsupported(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}
