use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    
    #[error("Configuration error: {0}")]
    Config(String),
    
    #[error("Invalid chunk size: {chunk_size} (must be between 1 and {max})", max = crate::config::MAX_CHUNK_SIZE)]
    InvalidChunkSize { chunk_size: usize },
    
    #[error("Dump directory not found: {path}")]
    DirectoryNotFound { path: String },
    
    #[error("Insufficient data: no dump bytes found in {corpus}")]
    InsufficientData { corpus: String },
    
    #[error("Index was built with chunk size {index}, but {requested} was requested")]
    ChunkSizeMismatch { index: usize, requested: usize },
    
    #[error("Index was built with {index} chunking, but {requested} was requested")]
    ChunkingMismatch {
        index: crate::ChunkingMode,
        requested: crate::ChunkingMode,
    },
    
    #[error("Operation cancelled")]
    Cancelled,
    
    #[error("Task failed: {0}")]
    Task(String),
    
    #[error("{0}")]
    Other(String),
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
