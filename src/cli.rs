use anyhow::{Context as _, Result};
use clap::{Args, Parser, Subcommand};
use orders_etl::config::{EtlConfig, TransformSettings};
use orders_etl::pipeline::{self, StageReport};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "orders-etl", about = "Batch ETL for orders and users", version)]
pub struct Cli {
    /// Directory for log files. Defaults to the platform data directory.
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Project root containing `data/` and `reports/`
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Path to a JSON settings file overriding transform defaults
    #[arg(long)]
    pub settings: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full pipeline and write `_run_meta.json` (default)
    Run(RunArgs),
    /// Read the raw inputs and write typed copies to the processed directory
    Load(RunArgs),
    /// Quality-gate and clean the orders, writing the missingness report
    Clean(RunArgs),
    /// Join cleaned orders with users and write the analytics table
    Analytics(RunArgs),
}

impl Default for Commands {
    fn default() -> Self {
        Self::Run(RunArgs {
            root: PathBuf::from("."),
            settings: None,
        })
    }
}

fn resolve_config(args: &RunArgs) -> Result<EtlConfig> {
    let cfg = EtlConfig::from_root(&args.root);
    match &args.settings {
        Some(path) => {
            let settings = TransformSettings::from_file(path)
                .with_context(|| format!("Failed to load settings from {}", path.display()))?;
            Ok(cfg.with_settings(settings))
        }
        None => Ok(cfg),
    }
}

fn print_stage(report: &StageReport) {
    println!("Stage '{}' completed with {} rows", report.stage, report.rows);
    for path in &report.outputs {
        println!("  wrote {}", path.display());
    }
}

pub fn run_command(command: Commands) -> Result<()> {
    match command {
        Commands::Run(args) => {
            let cfg = resolve_config(&args)?;
            let report = pipeline::run_etl(&cfg).context("ETL run failed")?;
            println!("{}", report.summary());
            println!("Run metadata: {}", cfg.run_meta.display());
        }
        Commands::Load(args) => {
            let cfg = resolve_config(&args)?;
            print_stage(&pipeline::run_load_stage(&cfg).context("Load stage failed")?);
        }
        Commands::Clean(args) => {
            let cfg = resolve_config(&args)?;
            print_stage(&pipeline::run_clean_stage(&cfg).context("Clean stage failed")?);
        }
        Commands::Analytics(args) => {
            let cfg = resolve_config(&args)?;
            print_stage(&pipeline::run_analytics_stage(&cfg).context("Analytics stage failed")?);
        }
    }
    Ok(())
}
