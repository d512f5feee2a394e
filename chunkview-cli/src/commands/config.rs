//! `chunkview config` - inspect and edit the configuration file.

use std::path::Path;

use clap::Subcommand;
use console::style;

use chunkview::config::{config_file_path, ConfigFile, ConfigKey};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print one setting
    Get {
        /// Key in section.key form (e.g. preview.chunk_size)
        key: String,
    },

    /// Change one setting
    Set {
        /// Key in section.key form (e.g. server.base_url)
        key: String,

        /// New value; empty clears optional settings
        value: String,
    },

    /// Print every setting
    List,

    /// Print the configuration file location
    Path,
}

/// Run a config subcommand against the default file.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    run_at(command, &config_file_path())
}

fn run_at(command: ConfigCommands, path: &Path) -> Result<(), CliError> {
    match command {
        ConfigCommands::Get { key } => {
            println!("{}", display_value(&get_value(path, &key)?));
        }
        ConfigCommands::Set { key, value } => {
            let key = set_value(path, &key, &value)?;
            println!("{} {} = {}", style("Set").green(), key, display_value(&value));
        }
        ConfigCommands::List => {
            let config = ConfigFile::load_from(path)?;
            print!("{}", render_list(&config));
        }
        ConfigCommands::Path => println!("{}", path.display()),
    }
    Ok(())
}

fn parse_key(key: &str) -> Result<ConfigKey, CliError> {
    key.parse().map_err(|_| {
        CliError::Config(format!(
            "unknown key '{}'. Run 'chunkview config list' to see available keys.",
            key
        ))
    })
}

fn get_value(path: &Path, key: &str) -> Result<String, CliError> {
    let key = parse_key(key)?;
    let config = ConfigFile::load_from(path)?;
    Ok(key.get(&config))
}

fn set_value(path: &Path, key: &str, value: &str) -> Result<ConfigKey, CliError> {
    let key = parse_key(key)?;
    let mut config = ConfigFile::load_from(path)?;
    key.set(&mut config, value)?;
    config.save_to(path)?;
    Ok(key)
}

fn render_list(config: &ConfigFile) -> String {
    let mut out = String::new();
    let mut section = "";

    for key in ConfigKey::all() {
        if key.section() != section {
            if !section.is_empty() {
                out.push('\n');
            }
            section = key.section();
            out.push_str(&format!("{}\n", style(format!("[{}]", section)).bold()));
        }
        out.push_str(&format!(
            "  {} = {}\n",
            key.key_name(),
            display_value(&key.get(config))
        ));
    }
    out
}

fn display_value(value: &str) -> String {
    if value.is_empty() {
        style("(not set)").dim().to_string()
    } else {
        value.to_string()
    }
}
