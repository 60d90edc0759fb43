use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use cluster_config::model::EffectiveConfig;
use cluster_config::settings::SnapshotConfig;
use cluster_config::snapshot::LocalSnapshotStore;

#[derive(Parser)]
#[command(name = "config-cli")]
#[command(about = "Inspect the local cluster configuration snapshot", long_about = None)]
struct Cli {
    /// Snapshot store root directory.
    #[arg(short, long, default_value_t = SnapshotConfig::default().directory)]
    dir: String,

    /// Snapshot category.
    #[arg(long, default_value_t = SnapshotConfig::default().category)]
    category: String,

    /// Snapshot key.
    #[arg(long, default_value_t = SnapshotConfig::default().key)]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the cached snapshot
    Show,
    /// Remove the cached snapshot
    Delete,
    /// Compare the cached snapshot with another snapshot file
    Diff {
        /// Snapshot file to compare against.
        other: PathBuf,
    },
    /// Print the default configuration
    Defaults,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let store = LocalSnapshotStore::new(&cli.dir);

    match cli.command {
        Commands::Show => match store.load(&cli.category, &cli.key)? {
            Some(config) => println!("{}", serde_json::to_string_pretty(&config)?),
            None => eprintln!("No snapshot at {}", store.path_of(&cli.category, &cli.key)?.display()),
        },
        Commands::Delete => {
            if store.delete(&cli.category, &cli.key)? {
                println!("Snapshot deleted");
            } else {
                println!("No snapshot to delete");
            }
        }
        Commands::Diff { other } => {
            let cached = store.load(&cli.category, &cli.key)?.unwrap_or_default();
            let other: EffectiveConfig = serde_json::from_str(&fs::read_to_string(&other)?)?;
            match cached.diff(&other) {
                Some(diff) => println!("{}", diff),
                None => println!("No differences"),
            }
        }
        Commands::Defaults => {
            println!("{}", serde_json::to_string_pretty(&EffectiveConfig::default())?);
        }
    }

    Ok(())
}
