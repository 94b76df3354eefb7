pub mod cancel;
pub mod chunker;
pub mod config;
pub mod corpus;
pub mod error;
pub mod estimator;
pub mod index;
pub mod sliding;
pub mod study;
pub mod types;

pub use cancel::CancelToken;
pub use config::ComparisonConfig;
pub use error::{Error, Result};
pub use estimator::{PairComparison, compare, estimate};
pub use index::{ChunkIndex, IndexStats, build_index};
pub use types::*;
