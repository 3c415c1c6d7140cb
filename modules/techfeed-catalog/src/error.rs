/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// A post referenced a tag that was still missing after the chunk's
    /// lookup-then-insert step. Fatal to that chunk only.
    #[error("Tag not resolved after upsert: {0}")]
    TagUnresolved(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}
