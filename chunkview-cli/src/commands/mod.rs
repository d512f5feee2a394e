//! CLI subcommands.

pub mod browse;
pub mod config;
