use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Batch Key Error: {0}")]
    BatchKey(String),
    #[error("Query Key Error: {0}")]
    QueryKey(String),
    #[error("Length Error: {0}")]
    Length(String),
    #[error("Invariant Violation: {0}")]
    Invariant(String),
    #[error("Node not found: {0}")]
    NodeNotFound(String),
    #[error("Decode Error: {0}")]
    Decode(String),
    #[error("Invalid proof: {0}")]
    Proof(String),
    #[error("Storage Error: {0}")]
    Storage(String),
    #[error("Encoding Error: {0}")]
    Ed(ed::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[cfg(feature = "full")]
    #[error(transparent)]
    RocksDB(#[from] rocksdb::Error),
}

impl From<ed::Error> for Error {
    fn from(err: ed::Error) -> Self {
        Error::Ed(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
