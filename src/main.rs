//! # Sightings CLI (`sightings`)
//!
//! ## Usage
//!
//! ```bash
//! sightings --config ./config/sightings.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sightings init` | Create both databases and their schemas |
//! | `sightings create '<json>'` | Create a sighting |
//! | `sightings update '<json>'` | Replace a sighting (id required) |
//! | `sightings get <id>` | Print one sighting as JSON |
//! | `sightings list` | One page of sightings from the record store |
//! | `sightings delete <id>` | Delete a sighting |
//! | `sightings search "<query>"` | Free-text search against the index |
//! | `sightings serve` | Start the HTTP server |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use sightings::{config, logging, migrate, records, search, server};

/// Sightings CLI: sighting records with free-text search.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/sightings.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "sightings",
    about = "Sightings: records in a relational store, mirrored into a free-text index",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/sightings.toml")]
    config: PathBuf,

    /// Log filter (e.g. `debug`, `sightings=trace`). `RUST_LOG` takes
    /// precedence; defaults to `[logging].level`.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the record store and search index schemas.
    ///
    /// Idempotent; running it multiple times is safe.
    Init,

    /// Start the HTTP server on `[server].bind`.
    Serve,

    /// Create a sighting from a JSON object. The object must not carry an id.
    Create {
        /// JSON object with camelCase field names.
        json: String,
    },

    /// Replace every field of an existing sighting. The JSON must carry its id.
    Update {
        json: String,
    },

    /// Print a sighting by id.
    Get {
        id: String,
    },

    /// List sightings from the record store.
    List {
        #[command(flatten)]
        paging: PagingArgs,
    },

    /// Delete a sighting from the record store and the index.
    Delete {
        id: String,
    },

    /// Search the index.
    ///
    /// The query uses the index's own syntax: `notes:lizard`,
    /// `"exact phrase"`, `AND` / `OR` / `NOT`, parentheses. `*` matches
    /// every record.
    Search {
        query: String,

        #[command(flatten)]
        paging: PagingArgs,
    },
}

#[derive(clap::Args)]
struct PagingArgs {
    /// Zero-based page number.
    #[arg(long)]
    page: Option<u32>,

    /// Page size; defaults to `[pagination].default_size`.
    #[arg(long)]
    size: Option<u32>,

    /// Sort term, `field[,asc|desc]`. May be repeated.
    #[arg(long)]
    sort: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    let level = cli.log_level.as_deref().unwrap_or(&cfg.logging.level);
    logging::init_tracing(level);

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Create { json } => {
            records::run_create(&cfg, &json).await?;
        }
        Commands::Update { json } => {
            records::run_update(&cfg, &json).await?;
        }
        Commands::Get { id } => {
            records::run_get(&cfg, &id).await?;
        }
        Commands::List { paging } => {
            records::run_list(&cfg, paging.page, paging.size, &paging.sort).await?;
        }
        Commands::Delete { id } => {
            records::run_delete(&cfg, &id).await?;
        }
        Commands::Search { query, paging } => {
            search::run_search(&cfg, &query, paging.page, paging.size, &paging.sort).await?;
        }
    }

    Ok(())
}
