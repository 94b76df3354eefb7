use super::{check_format, format_ratio, progress_bar};
use anyhow::{Result, anyhow};
use clap::Args;
use pagedup_core::CancelToken;
use pagedup_core::study::{StudyConfig, run_sweep};
use std::path::PathBuf;
use tracing::info;

#[derive(Args)]
pub struct SweepCommand {
    #[arg(help = "Study file (TOML) listing corpus pairs and chunk sizes")]
    study: PathBuf,

    #[arg(long, help = "Write the sweep report as JSON to this path")]
    output: Option<PathBuf>,

    #[arg(long, help = "Override the number of concurrent comparisons")]
    jobs: Option<usize>,

    #[arg(long, help = "Output format (table, json)")]
    format: Option<String>,
}

impl SweepCommand {
    pub async fn run(&self, cancel: &CancelToken, quiet: bool) -> Result<()> {
        let format = check_format(self.format.as_deref())?;

        info!("Loading study from: {}", self.study.display());
        let mut study = StudyConfig::load(&self.study)
            .await
            .map_err(|e| anyhow!("Failed to load study {}: {}", self.study.display(), e))?;
        if let Some(jobs) = self.jobs {
            study.concurrency = Some(jobs);
        }

        let total = (study.pairs.len() * study.chunk_sizes.len()) as u64;
        let pb = progress_bar(total, quiet);
        pb.set_message("Comparing corpora...");

        let report = run_sweep(&study, cancel, |point| {
            pb.set_message(format!("{} @ {}B", point.label, point.chunk_size));
            pb.inc(1);
        })
        .await?;
        pb.finish_with_message("Sweep complete");

        if let Some(output) = &self.output {
            report.save(output).await?;
            info!("Saved sweep report to: {}", output.display());
        }

        match format {
            "json" => {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            _ => {
                println!(
                    "{:<20} {:>10} {:>10} {:>10} {:>10}",
                    "Pair", "Chunk", "Percent1", "Percent2", "Best"
                );
                println!("{:-<64}", "");

                for point in &report.points {
                    println!(
                        "{:<20} {:>10} {:>10} {:>10} {:>10}",
                        point.label,
                        point.chunk_size,
                        format_ratio(point.forward.ratio()),
                        format_ratio(point.backward.ratio()),
                        format_ratio(point.best)
                    );
                }
            }
        }

        Ok(())
    }
}
