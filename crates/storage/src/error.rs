use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Unknown {kind}: {value}")]
    UnknownEnumValue { kind: &'static str, value: String },

    #[error("Property not found: {0}")]
    PropertyNotFound(uuid::Uuid),

    #[error("{0}")]
    Other(String),
}

impl StoreError {
    pub fn unknown(kind: &'static str, value: impl Into<String>) -> Self {
        StoreError::UnknownEnumValue { kind, value: value.into() }
    }
}
