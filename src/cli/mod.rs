//! # Command Line Interface
//!
//! A single `learn` subcommand reads interaction capture files, learns them
//! into per-address specs, approves the suggested parameterized review, and
//! prints the generated OpenAPI document(s). State can optionally be loaded
//! from and persisted to a file.

pub mod learn;

use clap::{Parser, Subcommand};

use crate::observability::init_tracing;

#[derive(Parser)]
#[command(name = "specsift")]
#[command(about = "Infer OpenAPI specifications from captured HTTP traffic")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Learn interaction capture files and print the generated documents
    Learn(learn::LearnArgs),
}

/// Run CLI commands
pub fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Learn(args) => learn::run(args),
    }
}
