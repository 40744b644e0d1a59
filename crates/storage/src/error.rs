use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A unique key (category name, field shortname) is already taken.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// A stored row holds a code the domain types do not know.
    #[error("invalid stored row: {0}")]
    Core(#[from] metafield_core::CoreError),
}
