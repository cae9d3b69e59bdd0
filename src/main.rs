//! Radio Engine - endless-session music recommendation and resolution.
//!
//! Picks the next track for a listening session from a local catalog and
//! transition graph, resolves playable audio through a tiered cache, and
//! shields a rate-limited upstream provider behind a quota tracker.

pub mod canonical;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod graph;
pub mod inference;
pub mod model;
pub mod quota;
pub mod recommend;
pub mod resolve;
#[cfg(test)]
pub mod test_utils;
pub mod upstream;

use clap::{CommandFactory, Parser};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::from_default_env().add_directive("radio_engine=info".parse()?))
        .init();

    if cli::run_command(&args)? {
        return Ok(());
    }

    // No command specified
    cli::Cli::command().print_help()?;
    Ok(())
}
