//! Command-line interface definitions using clap
//!
//! Flags mirror the environment variables of the same meaning and take
//! precedence over them.

use clap::Parser;

/// Shortener - URL shortening service
#[derive(Parser, Debug, Default, Clone)]
#[command(name = "shortener")]
#[command(version)]
#[command(about = "URL shortening service with debounced batch deletion", long_about = None)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, short = 'c')]
    pub config: Option<String>,

    /// Listen address, e.g. 127.0.0.1:8080
    #[arg(short = 'a')]
    pub address: Option<String>,

    /// Base URL prepended to generated aliases
    #[arg(short = 'b')]
    pub base_url: Option<String>,

    /// Append-only file used to persist short URLs
    #[arg(short = 'f')]
    pub file_storage_path: Option<String>,

    /// Database connection string (sqlite://, postgres://, mysql://)
    #[arg(short = 'd')]
    pub database_dsn: Option<String>,

    /// Print a sample configuration file and exit
    #[arg(long)]
    pub generate_config: bool,
}
