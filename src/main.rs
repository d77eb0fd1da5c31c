//! Tunecast - autonomous chat radio
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tunecast::cli::args::{ConfigAction, ConfigArgs};
use tunecast::cli::{Cli, Commands, LogFormat};
use tunecast::config::{Config, ConfigManager};
use tunecast::error::TunecastResult;
use tunecast::ui;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            ui::error(&e.to_string(), e.hint());
            ExitCode::FAILURE
        }
    }
}

async fn run() -> TunecastResult<()> {
    let cli = Cli::parse();

    let manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };

    // A broken config file must not block rewriting it
    let config = match manager.load().await {
        Ok(config) => config,
        Err(e) if is_config_init(&cli.command) => {
            eprintln!("Ignoring unreadable config: {}", e);
            Config::default()
        }
        Err(e) => return Err(e),
    };

    let format = cli.log_format.unwrap_or(if config.general.log_format == "json" {
        LogFormat::Json
    } else {
        LogFormat::Text
    });
    init_logging(cli.verbose, format);
    debug!(path = %manager.path().display(), "Config");

    match cli.command {
        Commands::Run(args) => tunecast::cli::commands::run(args, &config).await,
        Commands::Search(args) => tunecast::cli::commands::search(args, &config).await,
        Commands::Fetch(args) => tunecast::cli::commands::fetch(args, &config).await,
        Commands::Cache(args) => tunecast::cli::commands::cache(args, &config).await,
        Commands::Config(args) => tunecast::cli::commands::config(args, &manager, &config).await,
        Commands::Moods => tunecast::cli::commands::moods(&config).await,
    }
}

fn is_config_init(command: &Commands) -> bool {
    matches!(
        command,
        Commands::Config(ConfigArgs {
            action: Some(ConfigAction::Init { .. })
        })
    )
}

/// 0 = warn, 1 = info, 2+ = debug; `RUST_LOG` wins when set
fn init_logging(verbose: u8, format: LogFormat) {
    let level = match verbose {
        0 => "tunecast=warn",
        1 => "tunecast=info",
        _ => "tunecast=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time()
            .init(),
    }
}
