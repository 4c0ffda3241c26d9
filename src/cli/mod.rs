//! Command line surface of the `termenu` binary.
//!
//! Includes the clap definitions, the non-interactive subcommands (`run`,
//! `history`, `config`) and the demonstration command catalogue the menu shows.

mod commands;
mod demo;

pub use commands::*;
pub use demo::*;
