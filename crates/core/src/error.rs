use thiserror::Error;

#[derive(Error, Debug)]
pub enum TieoutError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(String),

    #[error("Property not found: {0}")]
    PropertyNotFound(String),

    #[error("Statement not found: {0}")]
    StatementNotFound(String),

    #[error("Malformed amount: {0}")]
    MalformedAmount(String),

    #[error("Invalid period: year {year} month {month}")]
    InvalidPeriod { year: i32, month: u32 },

    #[error("{0}")]
    Other(String),
}
