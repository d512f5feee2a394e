//! chunkview CLI - browse server-held tabular datasets from the terminal.

mod commands;
mod error;

use clap::{Parser, Subcommand};
use console::style;
use tracing::info;

use chunkview::config::ConfigFile;
use chunkview::logging::init_logging;

use commands::browse::BrowseArgs;
use commands::config::ConfigCommands;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "chunkview")]
#[command(version, about = "Browse large server-held datasets one chunk at a time")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Open a dataset and page through it interactively
    Browse {
        /// Dataset handle issued by the server
        handle: String,

        /// Server base URL (overrides server.base_url)
        #[arg(long)]
        base_url: Option<String>,

        /// Rows per chunk (overrides preview.chunk_size)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        chunk_size: Option<u32>,

        /// Do not fetch neighboring chunks ahead of time
        #[arg(long)]
        no_prefetch: bool,
    },

    /// View or change configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("{} {}", style("error:").red().bold(), e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Config { command } => commands::config::run(command),
        Commands::Browse {
            handle,
            base_url,
            chunk_size,
            no_prefetch,
        } => {
            let config = ConfigFile::load()?;
            let _logging = init_logging(&config.logging_config())?;
            info!(version = chunkview::VERSION, handle = %handle, "chunkview starting");

            commands::browse::run(
                BrowseArgs {
                    handle,
                    base_url,
                    chunk_size,
                    no_prefetch,
                },
                config,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_browse_rejects_zero_chunk_size() {
        let parsed = Cli::try_parse_from(["chunkview", "browse", "valid-1", "--chunk-size", "0"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_browse_arguments() {
        let cli = Cli::try_parse_from([
            "chunkview",
            "browse",
            "valid-1",
            "--chunk-size",
            "25",
            "--no-prefetch",
        ])
        .unwrap();
        match cli.command {
            Commands::Browse {
                handle,
                chunk_size,
                no_prefetch,
                base_url,
            } => {
                assert_eq!(handle, "valid-1");
                assert_eq!(chunk_size, Some(25));
                assert!(no_prefetch);
                assert!(base_url.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
