//! CLI command definitions and dispatch.
//!
//! Each subcommand is implemented in its own submodule:
//! - `play`: next-track recommendation, transition recording, trending
//! - `resolve`: search and audio resolution through the tier chain
//! - `admin`: quota status, archive, purge, and inference maintenance

mod admin;
mod play;
mod resolve;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::runtime::Runtime;

pub use admin::{cmd_archive, cmd_purge, cmd_quota, cmd_reinfer};
pub use play::{cmd_next, cmd_record, cmd_trending};
pub use resolve::{cmd_resolve, cmd_search};

/// Radio engine CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Database path
    #[arg(long, global = true, default_value = "radio_engine.db")]
    pub db: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Search for tracks (upstream when the budget allows, local otherwise)
    Search {
        /// Free-text query
        query: String,
        /// Maximum results
        #[arg(short, long, default_value = "10")]
        max: u32,
    },
    /// Recommend the next track after the given one
    Next {
        /// External id of the current track
        external_id: String,
        /// Session identifier
        #[arg(short, long, default_value = "cli")]
        session: String,
    },
    /// Record an observed transition between two tracks
    Record {
        /// External id of the track that played
        from: String,
        /// External id of the track that followed
        to: String,
        /// Session identifier
        #[arg(short, long, default_value = "cli")]
        session: String,
        /// The listener skipped the first track
        #[arg(long)]
        skipped: bool,
        /// How the transition happened: auto, manual, or shuffle
        #[arg(long, default_value = "auto")]
        source: String,
    },
    /// Show the strongest transitions of the recent past
    Trending {
        /// Window in hours
        #[arg(long, default_value = "24")]
        hours: i64,
        /// Maximum pairs
        #[arg(short, long, default_value = "10")]
        max: i64,
    },
    /// Resolve a playable reference for a track
    Resolve {
        /// External id of the track
        external_id: String,
    },
    /// Archive an audio file into the object store
    Archive {
        /// External id of the track
        external_id: String,
        /// Path to the audio file
        path: PathBuf,
    },
    /// Purge cached playable references for a track
    Purge {
        /// External id of the track
        external_id: String,
    },
    /// Re-run vibe inference for a stored track
    Reinfer {
        /// External id of the track
        external_id: String,
    },
    /// Show quota configuration and operation costs
    Quota,
}

/// Run the specified CLI command.
///
/// Returns `Ok(true)` if a command was run, `Ok(false)` if none was
/// specified.
pub fn run_command(cli: &Cli) -> anyhow::Result<bool> {
    let rt = Runtime::new()?;

    match &cli.command {
        Some(Commands::Search { query, max }) => {
            cmd_search(&rt, &cli.db, query, *max)?;
            Ok(true)
        }
        Some(Commands::Next {
            external_id,
            session,
        }) => {
            cmd_next(&rt, &cli.db, external_id, session)?;
            Ok(true)
        }
        Some(Commands::Record {
            from,
            to,
            session,
            skipped,
            source,
        }) => {
            cmd_record(&rt, &cli.db, from, to, session, *skipped, source)?;
            Ok(true)
        }
        Some(Commands::Trending { hours, max }) => {
            cmd_trending(&rt, &cli.db, *hours, *max)?;
            Ok(true)
        }
        Some(Commands::Resolve { external_id }) => {
            cmd_resolve(&rt, &cli.db, external_id)?;
            Ok(true)
        }
        Some(Commands::Archive { external_id, path }) => {
            cmd_archive(&rt, &cli.db, external_id, path)?;
            Ok(true)
        }
        Some(Commands::Purge { external_id }) => {
            cmd_purge(&rt, &cli.db, external_id)?;
            Ok(true)
        }
        Some(Commands::Reinfer { external_id }) => {
            cmd_reinfer(&rt, &cli.db, external_id)?;
            Ok(true)
        }
        Some(Commands::Quota) => {
            cmd_quota()?;
            Ok(true)
        }
        None => Ok(false),
    }
}
