//! # orders-etl entry point
//!
//! ```text
//! main()
//!   │
//!   ├─> Parse CLI arguments (clap)
//!   ├─> Initialize logging (console + rolling files)
//!   └─> Dispatch: run (default) | load | clean | analytics
//! ```
//!
//! ```bash
//! orders-etl                       # full run from the current directory
//! orders-etl clean --root ./proj   # a single stage
//! RUST_LOG=debug orders-etl run --settings settings.json
//! ```

#![warn(clippy::all, rust_2018_idioms)]
#![expect(clippy::print_stdout)] // CLI summaries go to stdout

mod cli;

use anyhow::Result;
use clap::Parser as _;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    orders_etl::logging::init(cli.log_dir.as_deref())?;

    let command = cli.command.unwrap_or_default();
    if let Err(err) = cli::run_command(command) {
        tracing::error!("{err:#}");
        return Err(err);
    }
    Ok(())
}
