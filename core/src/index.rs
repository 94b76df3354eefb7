use crate::chunker::Chunker;
use crate::corpus::DumpCorpus;
use crate::{CancelToken, ChunkingMode, ComparisonConfig, Digest, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::ops::ControlFlow;
use std::path::Path;
use tracing::{debug, info};

/// Digest-keyed buckets of windows observed in one corpus.
///
/// Windows are owned copies, so the index outlives the dump buffers it was
/// built from. Every stored window is exactly `2 * chunk_size` bytes and no
/// bucket holds the same window twice.
#[derive(Debug, Clone)]
pub struct ChunkIndex {
    chunk_size: usize,
    chunking: ChunkingMode,
    buckets: HashMap<Digest, Vec<Box<[u8]>>>,
    windows_stored: usize,
    chunks_processed: usize,
    files_scanned: u64,
    files_skipped: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub chunk_size: usize,
    pub chunking: ChunkingMode,
    pub buckets: usize,
    pub windows: usize,
    pub chunks_processed: usize,
    pub largest_bucket: usize,
    pub files_scanned: u64,
    pub files_skipped: u64,
}

impl ChunkIndex {
    pub fn new(chunk_size: usize, chunking: ChunkingMode) -> Self {
        Self {
            chunk_size,
            chunking,
            buckets: HashMap::new(),
            windows_stored: 0,
            chunks_processed: 0,
            files_scanned: 0,
            files_skipped: 0,
        }
    }

    /// Scans every dump under `dir` and indexes its windows.
    ///
    /// Stops once `config.max_chunks` windows have been processed across the
    /// whole corpus. A corpus without full windows yields an empty index.
    pub fn build<P: AsRef<Path>>(
        dir: P,
        config: &ComparisonConfig,
        cancel: &CancelToken,
    ) -> Result<Self> {
        config.validate()?;
        let corpus = DumpCorpus::open(dir, &config.dump_prefix)?;
        let chunker = Chunker::from_config(config);
        let mut index = Self::new(config.chunk_size, config.chunking);

        let summary = corpus.for_each_dump(cancel, |path, data| {
            for window in chunker.windows(data) {
                index.insert(window.digest, window.bytes);
                index.chunks_processed += 1;

                if index.chunks_processed >= config.max_chunks {
                    debug!(
                        "Chunk limit {} reached in {}",
                        config.max_chunks,
                        path.display()
                    );
                    return ControlFlow::Break(());
                }
            }
            ControlFlow::Continue(())
        })?;
        index.files_scanned = summary.files_read;
        index.files_skipped = summary.files_skipped;

        info!(
            "Indexed {}: {} chunks, {} buckets, {} windows from {} files ({} skipped)",
            corpus.root().display(),
            index.chunks_processed,
            index.len(),
            index.windows_stored,
            index.files_scanned,
            index.files_skipped
        );
        Ok(index)
    }

    /// Stores `window` under `digest` unless the bucket already holds an
    /// identical window. Returns whether it was stored.
    pub fn insert(&mut self, digest: Digest, window: &[u8]) -> bool {
        debug_assert_eq!(window.len(), self.chunk_size.saturating_mul(2));

        let bucket = self.buckets.entry(digest).or_default();
        if bucket.iter().any(|existing| existing.as_ref() == window) {
            return false;
        }
        bucket.push(window.into());
        if bucket.len() > 1 {
            debug!("Digest {} holds {} distinct windows", digest, bucket.len());
        }
        self.windows_stored += 1;
        true
    }

    pub fn candidates(&self, digest: &Digest) -> Option<&[Box<[u8]>]> {
        self.buckets.get(digest).map(Vec::as_slice)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunking(&self) -> ChunkingMode {
        self.chunking
    }

    /// Number of distinct digests.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn window_count(&self) -> usize {
        self.windows_stored
    }

    pub fn chunks_processed(&self) -> usize {
        self.chunks_processed
    }

    pub fn files_scanned(&self) -> u64 {
        self.files_scanned
    }

    pub fn files_skipped(&self) -> u64 {
        self.files_skipped
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            chunk_size: self.chunk_size,
            chunking: self.chunking,
            buckets: self.len(),
            windows: self.windows_stored,
            chunks_processed: self.chunks_processed,
            largest_bucket: self.buckets.values().map(Vec::len).max().unwrap_or(0),
            files_scanned: self.files_scanned,
            files_skipped: self.files_skipped,
        }
    }
}

/// Builds an index with the default dump prefix and fixed chunking.
pub fn build_index<P: AsRef<Path>>(
    directory: P,
    max_chunks: usize,
    chunk_size: usize,
) -> Result<ChunkIndex> {
    let config = ComparisonConfig::new(chunk_size).with_max_chunks(max_chunks);
    ChunkIndex::build(directory, &config, &CancelToken::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use rand::rngs::StdRng;
    use rand::{RngCore, SeedableRng};
    use std::fs;

    fn random_bytes(len: usize, seed: u64) -> Vec<u8> {
        let mut data = vec![0u8; len];
        StdRng::seed_from_u64(seed).fill_bytes(&mut data);
        data
    }

    #[test]
    fn test_one_kib_file_has_eight_buckets() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("pages-1.img"), random_bytes(1024, 11)).unwrap();

        let index = build_index(dir.path(), 5_000_000, 64).unwrap();
        assert_eq!(index.len(), 8);
        assert_eq!(index.window_count(), 8);
        assert_eq!(index.chunks_processed(), 8);
        assert_eq!(index.stats().largest_bucket, 1);
    }

    #[test]
    fn test_identical_windows_stored_once() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("pages-zero"), vec![0u8; 1024]).unwrap();
        fs::write(dir.path().join("pages-zero-2"), vec![0u8; 512]).unwrap();

        let index = build_index(dir.path(), 5_000_000, 64).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.window_count(), 1);
        assert_eq!(index.chunks_processed(), 12);
        assert_eq!(index.files_scanned(), 2);
    }

    #[test]
    fn test_colliding_bucket_keeps_distinct_windows() {
        let mut index = ChunkIndex::new(4, ChunkingMode::Fixed);
        let digest = Digest::from_data(b"aaaa");
        assert!(index.insert(digest, b"aaaabbbb"));
        assert!(index.insert(digest, b"ccccdddd"));
        assert!(!index.insert(digest, b"aaaabbbb"));

        assert_eq!(index.len(), 1);
        assert_eq!(index.candidates(&digest).unwrap().len(), 2);
        assert!(index.candidates(&Digest::from_data(b"bbbb")).is_none());
    }

    #[test]
    fn test_max_chunks_caps_whole_index() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("pages-a"), random_bytes(1024, 1)).unwrap();
        fs::write(dir.path().join("pages-b"), random_bytes(1024, 2)).unwrap();

        let index = build_index(dir.path(), 10, 64).unwrap();
        assert_eq!(index.chunks_processed(), 10);
        assert_eq!(index.window_count(), 10);
    }

    #[test]
    fn test_empty_corpus_gives_empty_index() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("inventory.img"), random_bytes(4096, 5)).unwrap();
        fs::write(dir.path().join("pages-short"), random_bytes(100, 5)).unwrap();

        let index = build_index(dir.path(), 100, 64).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.files_scanned(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_stats_count_skipped_files() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("pages-a"), random_bytes(1024, 3)).unwrap();
        let locked = dir.path().join("pages-b");
        fs::write(&locked, random_bytes(1024, 4)).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::read(&locked).is_ok() {
            return;
        }

        let index = build_index(dir.path(), 5_000_000, 64).unwrap();
        let stats = index.stats();
        assert_eq!(stats.files_scanned, 1);
        assert_eq!(stats.files_skipped, 1);
        assert_eq!(stats.windows, 8);
        assert_eq!(stats.chunking, ChunkingMode::Fixed);
    }

    #[test]
    fn test_invalid_parameters_fail_fast() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            build_index(dir.path(), 100, 0),
            Err(Error::InvalidChunkSize { .. })
        ));
        assert!(matches!(
            build_index(dir.path().join("missing"), 100, 64),
            Err(Error::DirectoryNotFound { .. })
        ));
    }

    #[test]
    fn test_coarser_chunks_give_fewer_digests() {
        let dir = tempfile::tempdir().unwrap();
        let data = random_bytes(64 * 1024, 9);
        fs::write(dir.path().join("pages-1"), &data).unwrap();

        let mut previous = usize::MAX;
        for chunk_size in [64, 128, 256, 512, 1024, 4096] {
            let index = build_index(dir.path(), 5_000_000, chunk_size).unwrap();
            assert!(index.len() <= previous);
            previous = index.len();
        }
    }
}
