//! The `learn` subcommand: build specs from interaction capture files.

use std::path::PathBuf;

use clap::{Args, ValueEnum};
use tracing::{info, warn};

use crate::config::Config;
use crate::registry::SpecRegistry;
use crate::telemetry::read_interactions_file;

#[derive(Args)]
pub struct LearnArgs {
    /// Interaction capture files (JSON)
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// State file: loaded before learning when present, written back after
    #[arg(long)]
    pub state: Option<PathBuf>,

    /// Output format for the generated documents
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
}

pub fn run(args: LearnArgs) -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let registry = match &args.state {
        Some(path) if path.exists() => {
            let bytes = std::fs::read(path)?;
            SpecRegistry::decode_state(&bytes, config)?
        }
        _ => SpecRegistry::new(config),
    };

    let mut learned = 0usize;
    let mut failed = 0usize;
    for file in &args.files {
        let interactions = match read_interactions_file(file) {
            Ok(interactions) => interactions,
            Err(error) => {
                warn!(file = %file.display(), error = %error, "skipping unreadable capture file");
                continue;
            }
        };
        for interaction in interactions {
            match registry.learn_telemetry(&interaction) {
                Ok(()) => learned += 1,
                Err(error) => {
                    // Per-interaction failures never abort the run.
                    warn!(
                        request_id = %interaction.request_id,
                        error = %error,
                        "failed to learn interaction; continuing"
                    );
                    failed += 1;
                }
            }
        }
    }
    info!(learned, failed, "finished learning interactions");

    for spec in registry.specs() {
        let review = spec.create_suggested_review();
        if !review.path_items.is_empty() {
            spec.apply_approved_review(&review.into())?;
        }
        if !spec.has_approved_paths() {
            continue;
        }

        let document = spec.generate_oas_document()?;
        print_document(&spec.address(), &document, args.format)?;
    }

    if let Some(path) = &args.state {
        std::fs::write(path, registry.encode_state()?)?;
        info!(path = %path.display(), "persisted registry state");
    }

    Ok(())
}

fn print_document(address: &str, document: &[u8], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", String::from_utf8_lossy(document));
        }
        OutputFormat::Yaml => {
            let value: serde_json::Value = serde_json::from_slice(document)?;
            println!("# {}", address);
            print!("{}", serde_yaml::to_string(&value)?);
        }
    }
    Ok(())
}
