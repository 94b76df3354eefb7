use super::{ComparisonArgs, check_format, format_ratio};
use anyhow::{Result, anyhow};
use clap::Args;
use pagedup_core::sliding::compare_sliding;
use pagedup_core::study::DirectionOutcome;
use pagedup_core::{CancelToken, compare};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Args)]
pub struct CompareCommand {
    #[arg(help = "First dump directory")]
    left: PathBuf,

    #[arg(help = "Second dump directory")]
    right: PathBuf,

    #[command(flatten)]
    options: ComparisonArgs,

    #[arg(
        long,
        default_value = "windowed",
        help = "Statistic to compute (windowed, sliding)"
    )]
    mode: String,

    #[arg(long, help = "Output format (table, json)")]
    format: Option<String>,
}

impl CompareCommand {
    pub async fn run(&self, cancel: &CancelToken) -> Result<()> {
        let format = check_format(self.format.as_deref())?;
        let config = self.options.to_config()?;

        for dir in [&self.left, &self.right] {
            if !dir.is_dir() {
                return Err(anyhow!("Dump directory does not exist: {}", dir.display()));
            }
        }

        info!(
            "Comparing {} and {} (chunk size {}, {} chunking, {} mode)",
            self.left.display(),
            self.right.display(),
            config.chunk_size,
            config.chunking,
            self.mode
        );

        let left = self.left.clone();
        let right = self.right.clone();
        let cancel = cancel.clone();

        match self.mode.as_str() {
            "windowed" => {
                let comparison = tokio::task::spawn_blocking(move || {
                    compare(&left, &right, &config, &cancel)
                })
                .await?;

                let forward = DirectionOutcome::from(&comparison.forward);
                let backward = DirectionOutcome::from(&comparison.backward);

                match format {
                    "json" => {
                        let json = serde_json::json!({
                            "left": comparison.left,
                            "right": comparison.right,
                            "chunk_size": self.options.chunk_size,
                            "forward": forward,
                            "backward": backward,
                            "best": comparison.best(),
                        });
                        println!("{}", serde_json::to_string_pretty(&json)?);
                    }
                    _ => {
                        print_direction("percent1", &self.left, &self.right, &forward);
                        print_direction("percent2", &self.right, &self.left, &backward);
                    }
                }

                if comparison.forward.is_err() && comparison.backward.is_err() {
                    return Err(anyhow!("Neither direction produced a redundancy ratio"));
                }
            }
            "sliding" => {
                let common = tokio::task::spawn_blocking(move || {
                    compare_sliding(&left, &right, &config, &cancel)
                })
                .await??;

                match format {
                    "json" => println!("{}", serde_json::to_string_pretty(&common)?),
                    _ => {
                        println!("percent1: {:.4}", common.percent1());
                        println!("percent2: {:.4}", common.percent2());
                        println!("shared digests: {}", common.shared_digests);
                    }
                }
            }
            other => {
                return Err(anyhow!(
                    "Unsupported mode: {}. Supported: windowed, sliding",
                    other
                ));
            }
        }

        Ok(())
    }
}

fn print_direction(name: &str, target: &Path, reference: &Path, outcome: &DirectionOutcome) {
    match outcome {
        DirectionOutcome::Measured {
            ratio,
            duplicate_bytes,
            total_bytes,
        } => println!(
            "{}: {} ({} in {}: {} / {} bytes)",
            name,
            format_ratio(Some(*ratio)),
            target.display(),
            reference.display(),
            duplicate_bytes,
            total_bytes
        ),
        DirectionOutcome::Failed { error } => println!(
            "{}: {} ({} in {}: {})",
            name,
            format_ratio(None),
            target.display(),
            reference.display(),
            error
        ),
    }
}
