use super::{ComparisonArgs, check_format};
use anyhow::{Result, anyhow};
use clap::Args;
use pagedup_core::{CancelToken, ChunkIndex};
use std::path::PathBuf;

#[derive(Args)]
pub struct StatsCommand {
    #[arg(help = "Dump directory to index")]
    dir: PathBuf,

    #[command(flatten)]
    options: ComparisonArgs,

    #[arg(long, help = "Output format (table, json)")]
    format: Option<String>,
}

impl StatsCommand {
    pub async fn run(&self, cancel: &CancelToken) -> Result<()> {
        let format = check_format(self.format.as_deref())?;
        let config = self.options.to_config()?;

        if !self.dir.is_dir() {
            return Err(anyhow!("Dump directory does not exist: {}", self.dir.display()));
        }

        let dir = self.dir.clone();
        let cancel = cancel.clone();
        let index =
            tokio::task::spawn_blocking(move || ChunkIndex::build(&dir, &config, &cancel)).await??;
        let stats = index.stats();

        match format {
            "json" => println!("{}", serde_json::to_string_pretty(&stats)?),
            _ => {
                println!("Directory:        {}", self.dir.display());
                println!("Chunk size:       {} B", stats.chunk_size);
                println!("Chunking:         {}", stats.chunking);
                println!("Files scanned:    {}", stats.files_scanned);
                println!("Files skipped:    {}", stats.files_skipped);
                println!("Chunks processed: {}", stats.chunks_processed);
                println!("Distinct digests: {}", stats.buckets);
                println!("Stored windows:   {}", stats.windows);
                println!("Largest bucket:   {}", stats.largest_bucket);
                println!(
                    "Index size:       {:.2} MB",
                    (stats.windows * 2 * stats.chunk_size) as f64 / 1024.0 / 1024.0
                );
            }
        }

        Ok(())
    }
}
