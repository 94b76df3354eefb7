use crate::{ChunkingMode, Error, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_DUMP_PREFIX: &str = "pages";
pub const DEFAULT_MAX_CHUNKS: usize = 5_000_000;
pub const DEFAULT_CHUNK_SIZE: usize = 64;
/// Largest chunk size whose window length still fits in a `usize`.
pub const MAX_CHUNK_SIZE: usize = usize::MAX / 2;

/// Parameters of a single directory-pair comparison.
///
/// Every scan receives its configuration explicitly; nothing here is global.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonConfig {
    /// Number of bytes hashed per window. The window itself is twice as long.
    pub chunk_size: usize,
    /// Upper bound on chunks processed while building one index.
    pub max_chunks: usize,
    /// Only files whose name starts with this prefix are read.
    pub dump_prefix: String,
    pub chunking: ChunkingMode,
}

impl ComparisonConfig {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size,
            ..Default::default()
        }
    }

    pub fn with_max_chunks(mut self, max_chunks: usize) -> Self {
        self.max_chunks = max_chunks;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.dump_prefix = prefix.into();
        self
    }

    pub fn with_chunking(mut self, chunking: ChunkingMode) -> Self {
        self.chunking = chunking;
        self
    }

    /// Distance between fixed anchors and length of every indexed window.
    pub fn period(&self) -> usize {
        self.chunk_size.saturating_mul(2)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 || self.chunk_size > MAX_CHUNK_SIZE {
            return Err(Error::InvalidChunkSize {
                chunk_size: self.chunk_size,
            });
        }
        if self.max_chunks == 0 {
            return Err(Error::Config("max_chunks must be at least 1".to_string()));
        }
        Ok(())
    }
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_chunks: DEFAULT_MAX_CHUNKS,
            dump_prefix: DEFAULT_DUMP_PREFIX.to_string(),
            chunking: ChunkingMode::Fixed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ComparisonConfig::new(256);
        assert_eq!(config.chunk_size, 256);
        assert_eq!(config.period(), 512);
        assert_eq!(config.max_chunks, DEFAULT_MAX_CHUNKS);
        assert_eq!(config.dump_prefix, "pages");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_bounds() {
        assert!(matches!(
            ComparisonConfig::new(0).validate(),
            Err(Error::InvalidChunkSize { chunk_size: 0 })
        ));
        assert!(ComparisonConfig::new(MAX_CHUNK_SIZE).validate().is_ok());
        assert!(matches!(
            ComparisonConfig::new(MAX_CHUNK_SIZE + 1).validate(),
            Err(Error::InvalidChunkSize { .. })
        ));
        assert!(ComparisonConfig::new(usize::MAX).validate().is_err());
        assert!(matches!(
            ComparisonConfig::new(64).with_max_chunks(0).validate(),
            Err(Error::Config(_))
        ));
    }
}
