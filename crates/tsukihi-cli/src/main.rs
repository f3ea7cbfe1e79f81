//! TSUKIHI CLI - batch driver for the microsimulation engine

mod commands;
mod config;
mod error;

use clap::{Parser, Subcommand};
use commands::RunCommand;
use config::Config;
use error::Result;

/// TSUKIHI - simulate patient lifetimes in months of time
#[derive(Parser, Debug)]
#[command(name = "tsukihi")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory searched for run input files
    #[arg(short = 'i', long, default_value = ".")]
    inputs: String,

    /// Directory receiving one output set per input
    #[arg(short = 'r', long, default_value = "results")]
    results: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run every input file found in the inputs directory
    Run(RunCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Build configuration
    let config = Config::new()
        .with_inputs_dir(&cli.inputs)
        .with_results_dir(&cli.results);

    // Execute subcommand
    match &cli.command {
        Commands::Run(cmd) => cmd.execute(&config)?,
    }

    Ok(())
}
