use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "afd")]
#[command(about = "Time-clock attendance and roster sync", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one sync cycle: collect every device, reconcile, push the merged roster
    Sync {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true, num_args = 1..)]
        config_paths: Vec<String>,

        /// Reconcile and report without pushing rosters or committing watermarks
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> site -> local...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Parse a saved AFD download offline and print the resolved records as JSON lines
    ParseAfd {
        /// Device id the dump came from
        #[arg(long, allow_negative_numbers = true)]
        device: i64,

        /// The file has no trailing filename footer (already trimmed)
        #[arg(long, default_value_t = false)]
        no_footer: bool,

        /// Path to the AFD dump (Windows-1252)
        file: PathBuf,
    },

    /// Check a saved roster export against the schema its header declares
    RosterCheck {
        /// Path to the roster export (Windows-1252)
        file: PathBuf,

        /// Also write the header and valid rows, re-escaped, to this path
        #[arg(long)]
        normalize: Option<PathBuf>,
    },

    /// Print persisted per-device watermarks
    Watermarks {
        /// Watermark store path
        #[arg(long)]
        state: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env.local if present (dev convenience). Silent if the file does
    // not exist; deployments inject env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Sync {
            config_paths,
            dry_run,
        } => {
            let summary = commands::sync::run(&config_paths, dry_run).await?;
            println!(
                "{}",
                serde_json::to_string(&summary).context("serialize cycle summary failed")?
            );
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = afd_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::ParseAfd {
            device,
            no_footer,
            file,
        } => commands::inspect::parse_afd(device, &file, no_footer)?,

        Commands::RosterCheck { file, normalize } => {
            commands::inspect::roster_check(&file, normalize.as_deref())?
        }

        Commands::Watermarks { state } => commands::inspect::watermarks(&state)?,
    }

    Ok(())
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
