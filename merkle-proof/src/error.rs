/// Error type definitions
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProofError {
    #[error("Invalid hash: {0:?}")]
    InvalidHash(String),

    #[error("Unknown transaction: {0}")]
    UnknownTransaction(String),

    #[error("Unsupported hash algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Index I/O error: {0}")]
    Index(#[from] std::io::Error),
}

impl From<serde_json::Error> for ProofError {
    fn from(err: serde_json::Error) -> Self {
        ProofError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ProofError>;
