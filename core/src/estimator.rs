use crate::chunker::{Chunker, match_length};
use crate::corpus::DumpCorpus;
use crate::index::ChunkIndex;
use crate::{CancelToken, ComparisonConfig, Error, RedundancyResult, Result};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Measures how many bytes of the corpus under `dir` are already present in
/// `reference`.
///
/// Every readable dump adds its full length to the denominator, including the
/// tail that does not fill a window. Each window credits the longest verified
/// match among the candidates sharing its digest.
///
/// # Errors
///
/// * `Error::ChunkSizeMismatch` - `reference` was built with another chunk size
/// * `Error::ChunkingMismatch` - `reference` anchors windows differently
/// * `Error::DirectoryNotFound` - `dir` does not exist
/// * `Error::InsufficientData` - no dump bytes were read
/// * `Error::Cancelled` - the token fired between files
pub fn estimate<P: AsRef<Path>>(
    dir: P,
    config: &ComparisonConfig,
    reference: &ChunkIndex,
    cancel: &CancelToken,
) -> Result<RedundancyResult> {
    config.validate()?;
    if reference.chunk_size() != config.chunk_size {
        return Err(Error::ChunkSizeMismatch {
            index: reference.chunk_size(),
            requested: config.chunk_size,
        });
    }
    if reference.chunking() != config.chunking {
        return Err(Error::ChunkingMismatch {
            index: reference.chunking(),
            requested: config.chunking,
        });
    }

    let corpus = DumpCorpus::open(dir, &config.dump_prefix)?;
    let chunker = Chunker::from_config(config);
    let mut duplicate_bytes = 0u64;

    let summary = corpus.for_each_dump(cancel, |path, data| {
        let mut file_duplicates = 0u64;
        for window in chunker.windows(data) {
            file_duplicates += best_match(reference, window.digest, window.bytes) as u64;
        }
        debug!(
            "{}: {} of {} bytes duplicated",
            path.display(),
            file_duplicates,
            data.len()
        );
        duplicate_bytes += file_duplicates;
        ControlFlow::Continue(())
    })?;

    if summary.bytes_read == 0 {
        return Err(Error::InsufficientData {
            corpus: corpus.root().display().to_string(),
        });
    }

    let result = RedundancyResult {
        duplicate_bytes,
        total_bytes: summary.bytes_read,
    };
    info!(
        "Redundancy of {}: {} over {} files ({} skipped)",
        corpus.root().display(),
        result,
        summary.files_read,
        summary.files_skipped
    );
    Ok(result)
}

/// Longest match any candidate in the probe's bucket provides.
///
/// Linear in the bucket size; candidates whose hashed prefix differs from
/// the probe count as zero.
pub fn best_match(reference: &ChunkIndex, digest: crate::Digest, probe: &[u8]) -> usize {
    let Some(candidates) = reference.candidates(&digest) else {
        return 0;
    };

    let chunk_size = reference.chunk_size();
    let mut longest = 0;
    for candidate in candidates {
        let length = match_length(candidate, probe, chunk_size);
        if length > longest {
            longest = length;
        }
    }
    longest
}

/// Both directions of one directory-pair comparison.
///
/// `forward` is `left` measured against an index of `right`; `backward` is
/// the reverse. Each direction succeeds or fails on its own.
#[derive(Debug)]
pub struct PairComparison {
    pub left: PathBuf,
    pub right: PathBuf,
    pub forward: Result<RedundancyResult>,
    pub backward: Result<RedundancyResult>,
}

impl PairComparison {
    /// The larger of the two ratios that succeeded.
    pub fn best(&self) -> Option<f64> {
        [&self.forward, &self.backward]
            .into_iter()
            .filter_map(|outcome| outcome.as_ref().ok())
            .map(RedundancyResult::ratio)
            .reduce(f64::max)
    }
}

/// Measures `target` against a freshly built index of `reference`.
pub fn measure<P: AsRef<Path>, Q: AsRef<Path>>(
    target: P,
    reference: Q,
    config: &ComparisonConfig,
    cancel: &CancelToken,
) -> Result<RedundancyResult> {
    let index = ChunkIndex::build(reference, config, cancel)?;
    estimate(target, config, &index, cancel)
}

/// Compares two dump directories in both directions.
///
/// Each index is dropped before the next one is built, so at most one
/// corpus worth of windows is resident at a time.
pub fn compare<P: AsRef<Path>, Q: AsRef<Path>>(
    left: P,
    right: Q,
    config: &ComparisonConfig,
    cancel: &CancelToken,
) -> PairComparison {
    let left = left.as_ref().to_path_buf();
    let right = right.as_ref().to_path_buf();

    let forward = measure(&left, &right, config, cancel);
    let backward = measure(&right, &left, config, cancel);

    PairComparison {
        left,
        right,
        forward,
        backward,
    }
}
