//! Command-line interface for the radio engine.
//!
//! Subcommands cover the daily loop (search, next, record) and the
//! operational side (resolve, archive, purge, reinfer, quota).

mod commands;

pub use commands::{Cli, Commands, run_command};
