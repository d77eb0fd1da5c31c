//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Tunecast - autonomous chat radio
///
/// Picks tracks for the current genre, mood or artist, downloads them
/// through a tiered search pipeline and publishes them one after another.
#[derive(Parser, Debug)]
#[command(name = "tunecast")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "TUNECAST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log output format (overrides general.log_format)
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a station, reading operator commands from stdin
    Run(RunArgs),

    /// Preview what the tiered search returns for a query
    Search(SearchArgs),

    /// Download one track by query or identifier
    Fetch(FetchArgs),

    /// Inspect or prune the result cache
    Cache(CacheArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),

    /// List configured moods and their genres
    Moods,
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Channel name shown in captions and logs
    #[arg(long, default_value = "console")]
    pub channel: String,

    /// Start in this genre instead of opening a vote
    #[arg(long, conflicts_with_all = ["mood", "artist"])]
    pub genre: Option<String>,

    /// Start in this mood
    #[arg(long, conflicts_with = "artist")]
    pub mood: Option<String>,

    /// Start playing this artist
    #[arg(long)]
    pub artist: Option<String>,

    /// Keep cache entries in memory only
    #[arg(long)]
    pub no_cache: bool,
}

/// Arguments for the search command
#[derive(Parser, Debug)]
pub struct SearchArgs {
    /// Free-text query
    #[arg(required = true, num_args = 1..)]
    pub query: Vec<String>,

    /// Maximum number of results
    #[arg(short, long, default_value = "10")]
    pub limit: usize,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the fetch command
#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// Free-text query or provider identifier
    #[arg(required = true, num_args = 1..)]
    pub query: Vec<String>,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,

    /// Keep cache entries in memory only
    #[arg(long)]
    pub no_cache: bool,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write the default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Show entry count, TTL and location
    Stats {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Remove entries older than the TTL
    Sweep,

    /// Remove every entry
    Clear {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Output format for listing commands
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
}

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_run_with_genre() {
        let cli = Cli::parse_from(["tunecast", "run", "--genre", "jazz"]);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.genre.as_deref(), Some("jazz"));
                assert_eq!(args.channel, "console");
                assert!(!args.no_cache);
            }
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn run_rejects_two_modes() {
        let result = Cli::try_parse_from(["tunecast", "run", "--genre", "jazz", "--mood", "chill"]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_parses_multi_word_search() {
        let cli = Cli::parse_from(["tunecast", "search", "miles", "davis", "-l", "3"]);
        match cli.command {
            Commands::Search(args) => {
                assert_eq!(args.query, vec!["miles", "davis"]);
                assert_eq!(args.limit, 3);
            }
            _ => panic!("expected Search command"),
        }
    }

    #[test]
    fn cli_parses_fetch() {
        let cli = Cli::parse_from(["tunecast", "fetch", "a-ha", "take", "on", "me", "--no-cache"]);
        match cli.command {
            Commands::Fetch(args) => {
                assert_eq!(args.query.join(" "), "a-ha take on me");
                assert!(args.no_cache);
            }
            _ => panic!("expected Fetch command"),
        }
    }

    #[test]
    fn cli_parses_cache_clear() {
        let cli = Cli::parse_from(["tunecast", "cache", "clear", "--yes"]);
        match cli.command {
            Commands::Cache(CacheArgs {
                action: CacheAction::Clear { yes },
            }) => assert!(yes),
            _ => panic!("expected cache clear"),
        }
    }

    #[test]
    fn verbosity_counts() {
        let cli = Cli::parse_from(["tunecast", "-vv", "moods"]);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Moods));
    }

    #[test]
    fn log_format_flag() {
        let cli = Cli::parse_from(["tunecast", "--log-format", "json", "moods"]);
        assert_eq!(cli.log_format, Some(LogFormat::Json));
    }
}
