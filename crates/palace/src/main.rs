// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Palace - proactive memory resurfacing.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod memories;
mod offline;
mod serve;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use palace_config::PalaceConfig;

/// Palace - proactive memory resurfacing.
#[derive(Parser, Debug)]
#[command(name = "palace", version, about, long_about = None)]
struct Cli {
    /// Read this file instead of the configuration hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the delivery gateway and the scheduled evaluation loop.
    Serve {
        /// JSON array of memories to seed the corpus with.
        #[arg(long)]
        memories: Option<PathBuf>,
    },
    /// Score the memories in a JSON file and print one result per line.
    Analyze {
        /// JSON array of memories.
        file: PathBuf,
    },
    /// Preview one evaluation over a memory file and print what it produces.
    Evaluate {
        /// JSON array of memories.
        memories: PathBuf,
        /// Evaluate as of this day (YYYY-MM-DD) instead of today.
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Inspect configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Validate configuration and report every problem.
    Check,
    /// Print the effective configuration with secrets redacted.
    Show,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => palace_config::load_and_validate_path(path),
        None => palace_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            palace_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.service.log_level);

    let result = match cli.command {
        Some(Commands::Serve { memories }) => serve::run_serve(config, memories).await,
        Some(Commands::Analyze { file }) => offline::run_analyze(&config, &file).await,
        Some(Commands::Evaluate { memories, date }) => {
            offline::run_evaluate(&config, &memories, date).await
        }
        Some(Commands::Config { action }) => {
            run_config(&config, action);
            Ok(())
        }
        None => {
            println!("palace: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run_config(config: &PalaceConfig, action: ConfigAction) {
    match action {
        ConfigAction::Check => println!("palace: configuration is valid"),
        ConfigAction::Show => {
            let mut shown = config.clone();
            if shown.gateway.auth_token.is_some() {
                shown.gateway.auth_token = Some("[redacted]".to_string());
            }
            match toml::to_string_pretty(&shown) {
                Ok(text) => print!("{text}"),
                Err(e) => eprintln!("error: cannot render configuration: {e}"),
            }
        }
    }
}

/// Logs go to stderr so command output on stdout stays machine-readable.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("palace={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn evaluate_takes_a_date() {
        let cli = Cli::try_parse_from([
            "palace",
            "--config",
            "/tmp/palace.toml",
            "evaluate",
            "memories.json",
            "--date",
            "2025-06-12",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/palace.toml")));
        match cli.command {
            Some(Commands::Evaluate { memories, date }) => {
                assert_eq!(memories, PathBuf::from("memories.json"));
                assert_eq!(date, NaiveDate::from_ymd_opt(2025, 6, 12));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn bad_date_is_rejected() {
        assert!(Cli::try_parse_from(["palace", "evaluate", "m.json", "--date", "June 12"]).is_err());
    }

    #[test]
    fn config_subcommand_requires_an_action() {
        assert!(Cli::try_parse_from(["palace", "config"]).is_err());
        assert!(matches!(
            Cli::try_parse_from(["palace", "config", "show"]).unwrap().command,
            Some(Commands::Config {
                action: ConfigAction::Show
            })
        ));
    }
}
