use thiserror::Error;

#[derive(Debug, Error)]
pub enum DtmError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("invalid catalog: {0}")]
    Catalog(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("position out of range: {0}")]
    OutOfRange(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type DtmResult<T> = Result<T, DtmError>;
