// src/main.rs
use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use log::info;
use std::path::{Path, PathBuf};
use vrm_enrich::{cap, config::load_config, enrichment, mot, utils::setup_logging};

#[derive(Debug, Parser)]
#[command(name = "vrm-enrich", version, about = "Batch vehicle registration enrichment")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Bulk retail check: description, valuation, metrics and competitor count per VRM
    Retail(BatchArgs),
    /// Most recent MOT test per registration
    Mot(BatchArgs),
    /// CAP monthly and live valuations
    Cap(BatchArgs),
}

#[derive(Debug, Args)]
struct BatchArgs {
    /// Input CSV with a header row and a VRM column
    #[arg(long)]
    input: PathBuf,

    /// Overrides OUTPUT_DIR
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

impl BatchArgs {
    fn output_dir<'a>(&'a self, default: &'a str) -> &'a Path {
        self.output_dir.as_deref().unwrap_or_else(|| Path::new(default))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config().context("Failed to load configuration")?;
    setup_logging(&config.log_level).context("Failed to initialize logging")?;
    config.validate_and_log();

    let (path, written) = match &cli.command {
        Command::Retail(args) => {
            info!("Starting bulk retail check for {}", args.input.display());
            enrichment::run_bulk_retail_check(&config, &args.input, args.output_dir(&config.output_dir))
                .await
                .context("Bulk retail check failed")?
        }
        Command::Mot(args) => {
            info!("Starting MOT checks for {}", args.input.display());
            mot::run_mot_checks(&config, &args.input, args.output_dir(&config.output_dir))
                .await
                .context("MOT checks failed")?
        }
        Command::Cap(args) => {
            info!("Starting CAP lookup for {}", args.input.display());
            cap::run_cap_lookup(&config, &args.input, args.output_dir(&config.output_dir))
                .await
                .context("CAP lookup failed")?
        }
    };

    info!("Report written to {} ({} rows)", path.display(), written);
    println!("{}\t{}", path.display(), written);
    Ok(())
}
