use serde::{Deserialize, Serialize};
use sha1::{Digest as _, Sha1};
use std::fmt;
use std::str::FromStr;

/// SHA-1 of the hashed prefix of a window. Only ever used as a bucket key;
/// equal digests are still verified byte-by-byte before a match is credited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; 20]);

impl Digest {
    pub fn from_data(data: &[u8]) -> Self {
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&Sha1::digest(data));
        Self(bytes)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// How window anchors are placed inside a dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChunkingMode {
    /// Anchors at every multiple of the period.
    #[default]
    Fixed,
    /// Anchors at FastCDC boundaries.
    ContentDefined,
}

impl FromStr for ChunkingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fixed" => Ok(ChunkingMode::Fixed),
            "cdc" | "content-defined" => Ok(ChunkingMode::ContentDefined),
            other => Err(format!("unknown chunking mode: {} (expected fixed or cdc)", other)),
        }
    }
}

impl fmt::Display for ChunkingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkingMode::Fixed => write!(f, "fixed"),
            ChunkingMode::ContentDefined => write!(f, "cdc"),
        }
    }
}

/// Byte counters of one corpus measured against a reference index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedundancyResult {
    pub duplicate_bytes: u64,
    pub total_bytes: u64,
}

impl RedundancyResult {
    /// Fraction of `total_bytes` found in the reference corpus, in `[0, 1]`.
    pub fn ratio(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        self.duplicate_bytes as f64 / self.total_bytes as f64
    }
}

impl fmt::Display for RedundancyResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.4} ({} / {} bytes)",
            self.ratio(),
            self.duplicate_bytes,
            self.total_bytes
        )
    }
}
