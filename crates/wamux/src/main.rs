// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wamux - multi-tenant WhatsApp session orchestrator.
//!
//! This is the binary entry point: configuration checks, persisted session
//! listing and environment diagnostics.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod doctor;
mod sessions;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use wamux_config::model::WamuxConfig;
use wamux_config::ConfigError;

/// Wamux - multi-tenant WhatsApp session orchestrator.
#[derive(Parser, Debug)]
#[command(name = "wamux", version, about, long_about = None)]
struct Cli {
    /// Load this TOML file instead of the standard config locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate the configuration and print the effective settings.
    Check,
    /// List persisted sessions and their device status.
    Sessions {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Run diagnostic checks against the environment.
    Doctor {
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
}

fn load_config(path: Option<&std::path::Path>) -> Result<WamuxConfig, Vec<ConfigError>> {
    match path {
        Some(path) => wamux_config::load_and_validate_path(path),
        None => wamux_config::load_and_validate(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(errors) => {
            wamux_config::render_errors(&errors);
            std::process::exit(1);
        }
    };
    init_tracing(&config.service.log_level);

    let result = match cli.command {
        Some(Commands::Check) => {
            print_config(&config);
            Ok(())
        }
        Some(Commands::Sessions { json }) => sessions::run_sessions(&config, json).await,
        Some(Commands::Doctor { plain }) => {
            doctor::run_doctor(&config, cli.config.as_deref(), plain).await
        }
        None => {
            println!("wamux: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("wamux: {e}");
        std::process::exit(1);
    }
}

fn print_config(config: &WamuxConfig) {
    println!("wamux: config valid (service.name={})", config.service.name);
    println!("  database         {}", config.storage.database_path);
    println!("  sessions dir     {}", config.session.sessions_dir);
    println!(
        "  retries          {} every {}ms",
        config.session.max_retries, config.session.reconnect_interval_ms
    );
    println!("  qr generations   {}", config.session.max_qr_generations);
}

/// Installs the global subscriber. `RUST_LOG` wins over the configured level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("wamux={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
