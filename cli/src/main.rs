mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{
    compare::CompareCommand, matrix::MatrixCommand, stats::StatsCommand, sweep::SweepCommand,
};
use pagedup_core::CancelToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(
    name = "pagedup",
    about = "Estimate memory redundancy between page-dump corpora",
    long_about = "Pagedup measures how much of one set of memory page dumps is already present in another, using hashed windows and byte-wise match extension"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    verbose: bool,

    #[arg(short, long, global = true, help = "Enable quiet mode")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Compare two dump directories in both directions")]
    Compare(CompareCommand),

    #[command(about = "Run a chunk-size sweep described by a study file")]
    Sweep(SweepCommand),

    #[command(about = "Build a cross-redundancy matrix over several dump directories")]
    Matrix(MatrixCommand),

    #[command(about = "Show chunk index statistics for a dump directory")]
    Stats(StatsCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    info!("Starting pagedup");

    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current file");
            on_interrupt.cancel();
        }
    });

    match cli.command {
        Commands::Compare(ref cmd) => cmd.run(&cancel).await,
        Commands::Sweep(ref cmd) => cmd.run(&cancel, cli.quiet).await,
        Commands::Matrix(ref cmd) => cmd.run(&cancel, cli.quiet).await,
        Commands::Stats(ref cmd) => cmd.run(&cancel).await,
    }
}

fn init_tracing(verbose: bool, quiet: bool) {
    let level = if quiet {
        "warn"
    } else if verbose {
        "debug"
    } else {
        "info"
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::new(format!(
            "pagedup={},pagedup_core={}",
            level, level
        )))
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Setting default subscriber failed");
}
