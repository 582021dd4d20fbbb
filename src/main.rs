use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use practice_core::constants::DEFAULT_PRACTICE_DATA_DIR;
use practice_core::{AutosaveConfig, FileStore, FormKind, PersistedId};

mod replay;

#[derive(Parser)]
#[command(name = "practice")]
#[command(about = "Autosave tools for therapy practice documents")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scripted editing session against the file store
    Replay {
        /// Path to the YAML script
        script: PathBuf,
    },
    /// List stored documents of a form
    List {
        /// Form name, e.g. case-history
        form: FormKind,
    },
    /// Print one stored document
    Show {
        /// Form name, e.g. case-history
        form: FormKind,
        /// Document id
        id: String,
    },
}

/// Main entry point for the practice tools
///
/// # Environment Variables
/// - `PRACTICE_DATA_DIR`: Directory for document storage (default: "practice_data")
/// - `PRACTICE_DEBOUNCE_MS`: Quiescence window before an autosave (default: 2000)
/// - `PRACTICE_SAVED_DISPLAY_MS`: How long "Auto-saved" stays visible (default: 3000)
/// - `PRACTICE_FAILED_DISPLAY_MS`: How long "Auto-save failed" stays visible (default: 5000)
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("practice=info".parse()?)
                .add_directive("practice_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AutosaveConfig::from_env_values(
        std::env::var("PRACTICE_DEBOUNCE_MS").ok(),
        std::env::var("PRACTICE_SAVED_DISPLAY_MS").ok(),
        std::env::var("PRACTICE_FAILED_DISPLAY_MS").ok(),
    )?;
    let data_dir = PathBuf::from(
        std::env::var("PRACTICE_DATA_DIR").unwrap_or_else(|_| DEFAULT_PRACTICE_DATA_DIR.into()),
    );

    let cli = Cli::parse();

    match cli.command {
        Commands::Replay { script } => {
            let persisted = replay::run(&script, &data_dir, config).await?;
            match persisted {
                Some(id) => println!("Persisted document: {}", id),
                None => println!("Nothing was persisted."),
            }
        }
        Commands::List { form } => {
            let store = FileStore::new(&data_dir, form);
            let records = store.list().await?;
            if records.is_empty() {
                println!("No {} documents found.", form);
            } else {
                for record in records {
                    println!(
                        "ID: {}, Target: {}, Created: {}, Updated: {}",
                        record.id, record.target, record.created_at, record.updated_at
                    );
                }
            }
        }
        Commands::Show { form, id } => {
            let store = FileStore::new(&data_dir, form);
            let record = store.read(&PersistedId::new(&id)?).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
    }

    Ok(())
}
