// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deskrelay - notification delivery and realtime fanout for helpdesks.
//!
//! This is the binary entry point for the deskrelay engine.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use clap::{Parser, Subcommand};

mod directory;
mod serve;
mod shutdown;

/// Deskrelay - notification delivery and realtime fanout for helpdesks.
#[derive(Parser, Debug)]
#[command(name = "deskrelay", version, about, long_about = None)]
struct Cli {
    /// Path to a configuration file (overrides the default search).
    #[arg(short, long, value_name = "FILE")]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the delivery engine and realtime gateway.
    Serve,
    /// Print the resolved configuration and exit.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => deskrelay_config::load_config_from_path(path),
        None => deskrelay_config::load_config(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            eprintln!("deskrelay: invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("deskrelay serve: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Config) => match toml::to_string_pretty(&config) {
            Ok(rendered) => println!("{rendered}"),
            Err(e) => {
                eprintln!("deskrelay config: render failed: {e}");
                std::process::exit(1);
            }
        },
        None => {
            println!("deskrelay: use --help for available commands");
        }
    }
}

#[cfg(test)]
mod tests {
    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        // Verify jemalloc is the global allocator by advancing the epoch.
        // Only jemalloc supports this -- the system allocator would fail.
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn binary_loads_config_defaults() {
        let config =
            deskrelay_config::load_config_from_str("").expect("default config should be valid");
        assert_eq!(config.engine.name, "deskrelay");
        assert_eq!(config.bus.mode, "local");
    }
}
