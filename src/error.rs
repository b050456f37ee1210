use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("tree file '{}' not found", .0.display())]
    NotFound(PathBuf),
    #[error("'{}' already exists", .0.display())]
    AlreadyExists(PathBuf),
    #[error("corrupt header: {0}")]
    CorruptHeader(String),
    #[error("corrupt record at address {address}: {reason}")]
    CorruptRecord { address: u64, reason: String },
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),
    #[error("parse error: {0}")]
    ParseError(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl DbError {
    pub(crate) fn corrupt_record(address: u64, reason: impl Into<String>) -> Self {
        DbError::CorruptRecord { address, reason: reason.into() }
    }
}

pub type DbResult<T> = Result<T, DbError>;
