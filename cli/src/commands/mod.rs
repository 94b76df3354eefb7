pub mod compare;
pub mod matrix;
pub mod stats;
pub mod sweep;

use anyhow::{Result, anyhow};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use pagedup_core::config::{DEFAULT_CHUNK_SIZE, DEFAULT_DUMP_PREFIX, DEFAULT_MAX_CHUNKS};
use pagedup_core::{ChunkingMode, ComparisonConfig};

/// Options shared by every command that scans dump directories.
#[derive(Args, Debug, Clone)]
pub struct ComparisonArgs {
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE, help = "Bytes hashed per window")]
    pub chunk_size: usize,

    #[arg(long, default_value_t = DEFAULT_MAX_CHUNKS, help = "Maximum chunks indexed per corpus")]
    pub max_chunks: usize,

    #[arg(
        long,
        env = "PAGEDUP_DUMP_PREFIX",
        default_value = DEFAULT_DUMP_PREFIX,
        help = "File name prefix of dump files"
    )]
    pub prefix: String,

    #[arg(long, default_value = "fixed", help = "Window anchoring (fixed, cdc)")]
    pub chunking: ChunkingMode,
}

impl ComparisonArgs {
    pub fn to_config(&self) -> Result<ComparisonConfig> {
        let config = ComparisonConfig::new(self.chunk_size)
            .with_max_chunks(self.max_chunks)
            .with_prefix(self.prefix.clone())
            .with_chunking(self.chunking);
        config.validate()?;
        Ok(config)
    }
}

pub fn check_format(format: Option<&str>) -> Result<&str> {
    match format.unwrap_or("table") {
        format @ ("table" | "json") => Ok(format),
        other => Err(anyhow!("Unsupported format: {}", other)),
    }
}

pub fn progress_bar(len: u64, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{bar:40.cyan/blue} {pos:>4}/{len:4} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    pb
}

pub fn format_ratio(ratio: Option<f64>) -> String {
    match ratio {
        Some(ratio) => format!("{:.4}", ratio),
        None => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        options: ComparisonArgs,
    }

    #[test]
    fn test_comparison_args() {
        let wrapper =
            Wrapper::try_parse_from(["pagedup", "--chunk-size", "128", "--chunking", "cdc"]).unwrap();
        let config = wrapper.options.to_config().unwrap();
        assert_eq!(config.chunk_size, 128);
        assert_eq!(config.chunking, ChunkingMode::ContentDefined);
        assert_eq!(config.max_chunks, DEFAULT_MAX_CHUNKS);

        let wrapper = Wrapper::try_parse_from(["pagedup", "--chunk-size", "0"]).unwrap();
        assert!(wrapper.options.to_config().is_err());

        assert!(Wrapper::try_parse_from(["pagedup", "--chunking", "rabin"]).is_err());
    }

    #[test]
    fn test_check_format() {
        assert_eq!(check_format(None).unwrap(), "table");
        assert_eq!(check_format(Some("json")).unwrap(), "json");
        assert!(check_format(Some("csv")).is_err());
    }

    #[test]
    fn test_format_ratio() {
        assert_eq!(format_ratio(Some(0.5)), "0.5000");
        assert_eq!(format_ratio(None), "-");
    }
}
