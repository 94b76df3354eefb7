use crate::corpus::DumpCorpus;
use crate::{CancelToken, ComparisonConfig, Digest, Error, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use tracing::info;

/// Digest of every `chunk_size` window at every byte offset, mapped to the
/// ordinals of the dump files it was seen in.
///
/// A cheaper, coarser statistic than window matching: it counts shared
/// digests and never extends a match.
#[derive(Debug, Clone)]
pub struct SlidingIndex {
    root: PathBuf,
    chunk_size: usize,
    table: HashMap<Digest, Vec<u32>>,
    entries: usize,
}

impl SlidingIndex {
    pub fn build<P: AsRef<Path>>(
        dir: P,
        config: &ComparisonConfig,
        cancel: &CancelToken,
    ) -> Result<Self> {
        config.validate()?;
        let corpus = DumpCorpus::open(dir, &config.dump_prefix)?;
        let chunk_size = config.chunk_size;
        let mut table: HashMap<Digest, Vec<u32>> = HashMap::new();
        let mut entries = 0usize;
        let mut ordinal = 0u32;

        corpus.for_each_dump(cancel, |_, data| {
            let file = ordinal;
            ordinal += 1;
            if data.len() < chunk_size {
                return ControlFlow::Continue(());
            }

            for start in 0..=data.len() - chunk_size {
                let digest = Digest::from_data(&data[start..start + chunk_size]);
                table.entry(digest).or_default().push(file);
                entries += 1;
                if entries >= config.max_chunks {
                    return ControlFlow::Break(());
                }
            }
            ControlFlow::Continue(())
        })?;

        info!(
            "Sliding index of {}: {} entries, {} distinct digests",
            corpus.root().display(),
            entries,
            table.len()
        );
        Ok(Self {
            root: corpus.root().to_path_buf(),
            chunk_size,
            table,
            entries,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Total hashed windows, counting repeats.
    pub fn entries(&self) -> usize {
        self.entries
    }

    pub fn distinct(&self) -> usize {
        self.table.len()
    }

    /// Files a digest was seen in, one ordinal per occurrence.
    pub fn occurrences(&self, digest: &Digest) -> Option<&[u32]> {
        self.table.get(digest).map(Vec::as_slice)
    }
}

/// Shared-digest counts between two sliding indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommonChunks {
    pub shared_digests: usize,
    pub common_left: usize,
    pub total_left: usize,
    pub common_right: usize,
    pub total_right: usize,
}

impl CommonChunks {
    /// Share of the left table's entries whose digest also occurs on the right.
    pub fn percent1(&self) -> f64 {
        self.common_left as f64 / self.total_left as f64
    }

    pub fn percent2(&self) -> f64 {
        self.common_right as f64 / self.total_right as f64
    }
}

pub fn common_chunks(left: &SlidingIndex, right: &SlidingIndex) -> Result<CommonChunks> {
    if left.chunk_size != right.chunk_size {
        return Err(Error::ChunkSizeMismatch {
            index: left.chunk_size,
            requested: right.chunk_size,
        });
    }
    for side in [left, right] {
        if side.entries == 0 {
            return Err(Error::InsufficientData {
                corpus: side.root.display().to_string(),
            });
        }
    }

    let mut common = CommonChunks {
        shared_digests: 0,
        common_left: 0,
        total_left: left.entries,
        common_right: 0,
        total_right: right.entries,
    };
    for (digest, left_files) in &left.table {
        if let Some(right_files) = right.table.get(digest) {
            common.shared_digests += 1;
            common.common_left += left_files.len();
            common.common_right += right_files.len();
        }
    }
    Ok(common)
}

/// Builds both sliding indexes and counts their shared digests.
pub fn compare_sliding<P: AsRef<Path>, Q: AsRef<Path>>(
    left: P,
    right: Q,
    config: &ComparisonConfig,
    cancel: &CancelToken,
) -> Result<CommonChunks> {
    let left = SlidingIndex::build(left, config, cancel)?;
    let right = SlidingIndex::build(right, config, cancel)?;
    common_chunks(&left, &right)
}
