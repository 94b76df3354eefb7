use crate::estimator::{PairComparison, compare, measure};
use crate::{CancelToken, ChunkingMode, ComparisonConfig, Error, RedundancyResult, Result};
use crate::config::{DEFAULT_DUMP_PREFIX, DEFAULT_MAX_CHUNKS};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use futures::stream;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

fn default_chunk_sizes() -> Vec<usize> {
    vec![64, 128, 256, 512, 1024]
}

fn default_max_chunks() -> usize {
    DEFAULT_MAX_CHUNKS
}

fn default_prefix() -> String {
    DEFAULT_DUMP_PREFIX.to_string()
}

/// Two dump directories taken from the same workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusPair {
    pub label: String,
    pub left: PathBuf,
    pub right: PathBuf,
}

/// A chunk-size sweep over a set of corpus pairs, usually read from TOML:
///
/// ```toml
/// chunk_sizes = [64, 256, 1024]
/// max_chunks = 1000000
///
/// [[pairs]]
/// label = "linalg"
/// left = "checkpoints/cont2"
/// right = "checkpoints/cont3"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyConfig {
    #[serde(default = "default_chunk_sizes")]
    pub chunk_sizes: Vec<usize>,
    #[serde(default = "default_max_chunks")]
    pub max_chunks: usize,
    #[serde(default = "default_prefix")]
    pub dump_prefix: String,
    #[serde(default)]
    pub chunking: ChunkingMode,
    /// Comparisons run at once; defaults to the available parallelism.
    #[serde(default)]
    pub concurrency: Option<usize>,
    #[serde(default)]
    pub pairs: Vec<CorpusPair>,
}

impl StudyConfig {
    pub fn from_toml(source: &str) -> Result<Self> {
        let study: StudyConfig = toml::from_str(source)?;
        study.validate()?;
        Ok(study)
    }

    /// Reads a study file. Relative corpus paths are taken relative to the
    /// file's directory.
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).await?;
        let mut study = Self::from_toml(&source)?;

        if let Some(base) = path.parent() {
            for pair in &mut study.pairs {
                pair.left = base.join(&pair.left);
                pair.right = base.join(&pair.right);
            }
        }
        Ok(study)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_sizes.is_empty() {
            return Err(Error::Config("at least one chunk size is required".to_string()));
        }
        for &chunk_size in &self.chunk_sizes {
            self.comparison(chunk_size).validate()?;
        }
        if self.concurrency == Some(0) {
            return Err(Error::Config("concurrency must be at least 1".to_string()));
        }
        if self.pairs.is_empty() {
            return Err(Error::Config("at least one corpus pair is required".to_string()));
        }

        let mut labels = HashSet::new();
        for pair in &self.pairs {
            if !labels.insert(pair.label.as_str()) {
                return Err(Error::Config(format!("duplicate pair label: {}", pair.label)));
            }
        }
        Ok(())
    }

    pub fn comparison(&self, chunk_size: usize) -> ComparisonConfig {
        ComparisonConfig::new(chunk_size)
            .with_max_chunks(self.max_chunks)
            .with_prefix(self.dump_prefix.clone())
            .with_chunking(self.chunking)
    }

    pub fn workers(&self) -> usize {
        self.concurrency.unwrap_or_else(default_workers)
    }
}

pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Result of one direction, as persisted in reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DirectionOutcome {
    Measured {
        ratio: f64,
        duplicate_bytes: u64,
        total_bytes: u64,
    },
    Failed {
        error: String,
    },
}

impl DirectionOutcome {
    pub fn ratio(&self) -> Option<f64> {
        match self {
            DirectionOutcome::Measured { ratio, .. } => Some(*ratio),
            DirectionOutcome::Failed { .. } => None,
        }
    }
}

impl From<&Result<RedundancyResult>> for DirectionOutcome {
    fn from(outcome: &Result<RedundancyResult>) -> Self {
        match outcome {
            Ok(result) => DirectionOutcome::Measured {
                ratio: result.ratio(),
                duplicate_bytes: result.duplicate_bytes,
                total_bytes: result.total_bytes,
            },
            Err(e) => DirectionOutcome::Failed {
                error: e.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepPoint {
    pub label: String,
    pub chunk_size: usize,
    /// Left corpus measured against the right one.
    pub forward: DirectionOutcome,
    /// Right corpus measured against the left one.
    pub backward: DirectionOutcome,
    /// Larger of the two ratios that succeeded.
    pub best: Option<f64>,
}

impl SweepPoint {
    fn from_comparison(label: &str, chunk_size: usize, comparison: &PairComparison) -> Self {
        Self {
            label: label.to_string(),
            chunk_size,
            forward: DirectionOutcome::from(&comparison.forward),
            backward: DirectionOutcome::from(&comparison.backward),
            best: comparison.best(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    pub generated_at: DateTime<Utc>,
    pub chunking: ChunkingMode,
    pub max_chunks: usize,
    pub points: Vec<SweepPoint>,
}

impl SweepReport {
    /// Points of one pair, in chunk-size order.
    pub fn series<'a>(&'a self, label: &'a str) -> impl Iterator<Item = &'a SweepPoint> + 'a {
        self.points.iter().filter(move |point| point.label == label)
    }

    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let data = serde_json::to_vec_pretty(self)?;
        fs::write(path, data).await?;
        Ok(())
    }

    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read(path).await?;
        Ok(serde_json::from_slice(&data)?)
    }
}

async fn blocking<T, F>(task: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| Error::Task(e.to_string()))
}

/// Runs every pair at every chunk size.
///
/// Each point is an independent blocking comparison; up to
/// `study.workers()` run at once. `on_point` sees points in completion order,
/// the report holds them sorted by label and chunk size.
pub async fn run_sweep<F>(
    study: &StudyConfig,
    cancel: &CancelToken,
    mut on_point: F,
) -> Result<SweepReport>
where
    F: FnMut(&SweepPoint),
{
    study.validate()?;

    let jobs: Vec<(CorpusPair, ComparisonConfig)> = study
        .pairs
        .iter()
        .flat_map(|pair| {
            study
                .chunk_sizes
                .iter()
                .map(move |&chunk_size| (pair.clone(), study.comparison(chunk_size)))
        })
        .collect();
    info!(
        "Sweeping {} pairs over {} chunk sizes ({} comparisons)",
        study.pairs.len(),
        study.chunk_sizes.len(),
        jobs.len()
    );

    let mut results = stream::iter(jobs.into_iter().map(|(pair, config)| {
        let cancel = cancel.clone();
        blocking(move || {
            let comparison = compare(&pair.left, &pair.right, &config, &cancel);
            SweepPoint::from_comparison(&pair.label, config.chunk_size, &comparison)
        })
    }))
    .buffer_unordered(study.workers());

    let mut points = Vec::new();
    while let Some(point) = results.next().await {
        let point = point?;
        if point.best.is_none() {
            warn!(
                "{} at chunk size {}: no direction produced a ratio",
                point.label, point.chunk_size
            );
        }
        on_point(&point);
        points.push(point);
    }
    cancel.check()?;

    points.sort_by(|a, b| a.label.cmp(&b.label).then(a.chunk_size.cmp(&b.chunk_size)));
    Ok(SweepReport {
        generated_at: Utc::now(),
        chunking: study.chunking,
        max_chunks: study.max_chunks,
        points,
    })
}

/// One row/column of a cross-redundancy matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedCorpus {
    pub label: String,
    pub dir: PathBuf,
    /// Second dump of the same workload, used for the diagonal cell.
    pub replica: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellFailure {
    pub row: usize,
    pub column: usize,
    pub error: String,
}

/// `cells[i][j]` is the ratio of corpus `i` measured against corpus `j`.
/// Diagonal cells hold the replica measured against its corpus, if the
/// corpus has one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedundancyMatrix {
    pub generated_at: DateTime<Utc>,
    pub chunk_size: usize,
    pub labels: Vec<String>,
    pub cells: Vec<Vec<Option<f64>>>,
    pub failures: Vec<CellFailure>,
}

impl RedundancyMatrix {
    pub fn get(&self, row: usize, column: usize) -> Option<f64> {
        self.cells.get(row)?.get(column).copied().flatten()
    }

    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let data = serde_json::to_vec_pretty(self)?;
        fs::write(path, data).await?;
        Ok(())
    }

    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read(path).await?;
        Ok(serde_json::from_slice(&data)?)
    }
}

type Cell = (usize, usize, Result<RedundancyResult>);

/// Measures every corpus against every other one at a single chunk size.
///
/// Each unordered pair is one comparison filling both of its cells.
/// `on_cell` is called once per finished comparison.
pub async fn run_matrix<F>(
    corpora: &[NamedCorpus],
    config: &ComparisonConfig,
    workers: usize,
    cancel: &CancelToken,
    mut on_cell: F,
) -> Result<RedundancyMatrix>
where
    F: FnMut(usize, usize),
{
    config.validate()?;
    if corpora.is_empty() {
        return Err(Error::Config("at least one corpus is required".to_string()));
    }
    if workers == 0 {
        return Err(Error::Config("concurrency must be at least 1".to_string()));
    }

    let n = corpora.len();
    let mut jobs = Vec::new();
    for row in 0..n {
        if let Some(replica) = &corpora[row].replica {
            jobs.push((row, row, corpora[row].dir.clone(), replica.clone()));
        }
        for column in row + 1..n {
            jobs.push((row, column, corpora[row].dir.clone(), corpora[column].dir.clone()));
        }
    }

    let mut results = stream::iter(jobs.into_iter().map(|(row, column, left, right)| {
        let config = config.clone();
        let cancel = cancel.clone();
        blocking(move || -> Vec<Cell> {
            if row == column {
                vec![(row, row, measure(&right, &left, &config, &cancel))]
            } else {
                let comparison = compare(&left, &right, &config, &cancel);
                vec![
                    (row, column, comparison.forward),
                    (column, row, comparison.backward),
                ]
            }
        })
    }))
    .buffer_unordered(workers);

    let mut cells = vec![vec![None; n]; n];
    let mut failures = Vec::new();
    while let Some(batch) = results.next().await {
        for (row, column, outcome) in batch? {
            match outcome {
                Ok(result) => cells[row][column] = Some(result.ratio()),
                Err(e) => failures.push(CellFailure {
                    row,
                    column,
                    error: e.to_string(),
                }),
            }
            on_cell(row, column);
        }
    }
    cancel.check()?;

    failures.sort_by_key(|failure| (failure.row, failure.column));
    Ok(RedundancyMatrix {
        generated_at: Utc::now(),
        chunk_size: config.chunk_size,
        labels: corpora.iter().map(|corpus| corpus.label.clone()).collect(),
        cells,
        failures,
    })
}
