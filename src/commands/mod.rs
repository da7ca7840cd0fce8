//! Subcommand implementations.

pub mod reload;
