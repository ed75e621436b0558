use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectionError {
    #[error("index {index} is out of range for a collection of {size} records")]
    Range { index: usize, size: usize },
    #[error("no record with key '{key}'")]
    KeyNotFound { key: String },
    #[error("a record with key '{key}' already exists")]
    DuplicateKey { key: String },
}

pub type CollectionResult<T> = Result<T, CollectionError>;
