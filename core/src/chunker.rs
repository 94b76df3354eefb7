use crate::{ChunkingMode, ComparisonConfig, Digest};
use fastcdc::v2020::{
    AVERAGE_MAX, AVERAGE_MIN, FastCDC, MAXIMUM_MAX, MAXIMUM_MIN, MINIMUM_MAX, MINIMUM_MIN,
};

/// Splits a dump buffer into hashed windows.
///
/// A window is `2 * chunk_size` bytes long. Only its first `chunk_size` bytes
/// feed the digest; the second half is kept for match extension.
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    chunk_size: usize,
    mode: ChunkingMode,
}

impl Chunker {
    pub fn new(chunk_size: usize, mode: ChunkingMode) -> Self {
        Self { chunk_size, mode }
    }

    pub fn from_config(config: &ComparisonConfig) -> Self {
        Self::new(config.chunk_size, config.chunking)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn period(&self) -> usize {
        self.chunk_size.saturating_mul(2)
    }

    /// Offsets at which a full window fits inside `data`.
    pub fn anchors(&self, data: &[u8]) -> Vec<usize> {
        let period = self.period();
        if period == 0 || data.len() < period {
            return Vec::new();
        }

        match self.mode {
            ChunkingMode::Fixed => (0..=data.len() - period).step_by(period).collect(),
            ChunkingMode::ContentDefined => {
                let (min_size, avg_size, max_size) = cdc_bounds(period);
                FastCDC::new(data, min_size, avg_size, max_size)
                    .map(|chunk| chunk.offset)
                    .filter(|offset| offset + period <= data.len())
                    .collect()
            }
        }
    }

    pub fn windows<'a>(&self, data: &'a [u8]) -> Windows<'a> {
        Windows {
            data,
            chunk_size: self.chunk_size,
            anchors: self.anchors(data).into_iter(),
        }
    }
}

/// FastCDC sizes targeting roughly one anchor per two periods, clamped to the
/// ranges the v2020 chunker accepts.
fn cdc_bounds(period: usize) -> (u32, u32, u32) {
    let period = u32::try_from(period).unwrap_or(u32::MAX);
    let min_size = period.clamp(MINIMUM_MIN, MINIMUM_MAX);
    let avg_size = period
        .saturating_mul(2)
        .clamp(AVERAGE_MIN.max(min_size), AVERAGE_MAX);
    let max_size = period
        .saturating_mul(4)
        .clamp(MAXIMUM_MIN.max(avg_size), MAXIMUM_MAX);
    (min_size, avg_size, max_size)
}

#[derive(Debug, Clone, Copy)]
pub struct Window<'a> {
    pub offset: usize,
    pub digest: Digest,
    pub bytes: &'a [u8],
}

pub struct Windows<'a> {
    data: &'a [u8],
    chunk_size: usize,
    anchors: std::vec::IntoIter<usize>,
}

impl<'a> Iterator for Windows<'a> {
    type Item = Window<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.anchors.next()?;
        let bytes = &self.data[offset..offset + 2 * self.chunk_size];
        Some(Window {
            offset,
            digest: Digest::from_data(&bytes[..self.chunk_size]),
            bytes,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.anchors.size_hint()
    }
}

/// Counts how many bytes past the hashed prefix agree, stopping at the first
/// mismatch.
///
/// Postcondition: the result is in `0..=period - chunk_size`, where `period`
/// is `2 * chunk_size`, and is further bounded by the shorter slice.
pub fn extend_match(candidate: &[u8], probe: &[u8], chunk_size: usize) -> usize {
    let end = chunk_size.saturating_mul(2).min(candidate.len()).min(probe.len());
    let mut matched = 0;
    let mut i = chunk_size;
    while i < end {
        if candidate[i] != probe[i] {
            break;
        }
        matched += 1;
        i += 1;
    }
    matched
}

/// Bytes of `probe` that `candidate` can supply: zero unless the hashed
/// prefixes are identical, otherwise the prefix plus its extension.
pub fn match_length(candidate: &[u8], probe: &[u8], chunk_size: usize) -> usize {
    if candidate.len() < chunk_size
        || probe.len() < chunk_size
        || candidate[..chunk_size] != probe[..chunk_size]
    {
        return 0;
    }
    chunk_size + extend_match(candidate, probe, chunk_size)
}
