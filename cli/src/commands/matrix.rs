use super::{ComparisonArgs, check_format, format_ratio, progress_bar};
use anyhow::{Result, anyhow};
use clap::Args;
use pagedup_core::CancelToken;
use pagedup_core::study::{NamedCorpus, default_workers, run_matrix};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Args)]
pub struct MatrixCommand {
    #[arg(required = true, help = "Dump directories, one per workload")]
    dirs: Vec<PathBuf>,

    #[arg(
        long,
        help = "Replica directory per workload, in the same order (\"-\" for none)"
    )]
    replica: Vec<String>,

    #[arg(long, help = "Label per workload, in the same order (defaults to directory names)")]
    label: Vec<String>,

    #[command(flatten)]
    options: ComparisonArgs,

    #[arg(long, help = "Number of concurrent comparisons")]
    jobs: Option<usize>,

    #[arg(long, help = "Write the matrix as JSON to this path")]
    output: Option<PathBuf>,

    #[arg(long, help = "Output format (table, json)")]
    format: Option<String>,
}

impl MatrixCommand {
    pub async fn run(&self, cancel: &CancelToken, quiet: bool) -> Result<()> {
        let format = check_format(self.format.as_deref())?;
        let config = self.options.to_config()?;
        let corpora = self.corpora()?;

        let n = corpora.len();
        let replicas = corpora.iter().filter(|c| c.replica.is_some()).count();
        let total = (n * (n - 1) + replicas) as u64;
        info!("Building {}x{} redundancy matrix ({} cells)", n, n, total);

        let pb = progress_bar(total, quiet);
        let matrix = run_matrix(
            &corpora,
            &config,
            self.jobs.unwrap_or_else(default_workers),
            cancel,
            |row, column| {
                pb.set_message(format!("{} in {}", corpora[row].label, corpora[column].label));
                pb.inc(1);
            },
        )
        .await?;
        pb.finish_with_message("Matrix complete");

        for failure in &matrix.failures {
            warn!(
                "{} in {}: {}",
                matrix.labels[failure.row], matrix.labels[failure.column], failure.error
            );
        }

        if let Some(output) = &self.output {
            matrix.save(output).await?;
            info!("Saved matrix to: {}", output.display());
        }

        match format {
            "json" => println!("{}", serde_json::to_string_pretty(&matrix)?),
            _ => {
                let width = matrix
                    .labels
                    .iter()
                    .map(String::len)
                    .max()
                    .unwrap_or(0)
                    .max(8);

                print!("{:<width$}", "", width = width);
                for label in &matrix.labels {
                    print!(" {:>width$}", label, width = width);
                }
                println!();

                for (row, label) in matrix.labels.iter().enumerate() {
                    print!("{:<width$}", label, width = width);
                    for column in 0..n {
                        print!(" {:>width$}", format_ratio(matrix.get(row, column)), width = width);
                    }
                    println!();
                }
            }
        }

        Ok(())
    }

    fn corpora(&self) -> Result<Vec<NamedCorpus>> {
        if !self.replica.is_empty() && self.replica.len() != self.dirs.len() {
            return Err(anyhow!(
                "Expected {} --replica values, got {}",
                self.dirs.len(),
                self.replica.len()
            ));
        }
        if !self.label.is_empty() && self.label.len() != self.dirs.len() {
            return Err(anyhow!(
                "Expected {} --label values, got {}",
                self.dirs.len(),
                self.label.len()
            ));
        }

        let mut corpora = Vec::with_capacity(self.dirs.len());
        for (i, dir) in self.dirs.iter().enumerate() {
            if !dir.is_dir() {
                return Err(anyhow!("Dump directory does not exist: {}", dir.display()));
            }

            let label = match self.label.get(i) {
                Some(label) => label.clone(),
                None => dir
                    .file_name()
                    .unwrap_or_default()
                    .to_string_lossy()
                    .to_string(),
            };
            let replica = self
                .replica
                .get(i)
                .filter(|replica| replica.as_str() != "-")
                .map(PathBuf::from);

            corpora.push(NamedCorpus {
                label,
                dir: dir.clone(),
                replica,
            });
        }
        Ok(corpora)
    }
}
