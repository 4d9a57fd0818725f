//! CLI command definitions and subcommands

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::api::endpoints::{AnimeSection, DEFAULT_SEARCH_LIMIT, Season};

/// cq - browse a rate-limited catalog API from the terminal
#[derive(Parser)]
#[command(
    name = "cq",
    about = "Query the catalog API through a rate-limit-aware request queue",
    version = env!("GIT_DESCRIBE"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Override the API base URL
    #[arg(long = "base-url", global = true)]
    pub base_url: Option<String>,

    /// Print raw JSON payloads
    #[arg(long, global = true)]
    pub json: bool,

    /// Retry timeouts, network errors and 5xx with exponential backoff
    #[arg(long, global = true)]
    pub retry: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch any endpoint (path + query, e.g. /anime/21/full)
    Get {
        /// Endpoint relative to the base URL
        endpoint: String,
    },

    /// Most popular titles
    Top,

    /// Seasonal listing
    Season {
        /// Which season
        #[arg(value_enum, default_value = "now")]
        which: SeasonArg,
    },

    /// Search titles by name
    Search {
        /// Search text
        query: String,

        /// Maximum results
        #[arg(short = 'n', long, default_value_t = DEFAULT_SEARCH_LIMIT)]
        limit: u32,
    },

    /// Show one title, or one section of it
    Anime {
        /// Title id
        id: u32,

        /// Section (full, episodes, videos, characters, staff, statistics,
        /// moreinfo, reviews, streaming, pictures, voices)
        #[arg(short, long)]
        section: Option<AnimeSection>,
    },

    /// Curated recommendations, fetched together through the queue
    Recommended,

    /// Print the effective configuration
    ShowConfig,
}

/// Season choices on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SeasonArg {
    Now,
    Upcoming,
}

impl From<SeasonArg> for Season {
    fn from(arg: SeasonArg) -> Self {
        match arg {
            SeasonArg::Now => Season::Now,
            SeasonArg::Upcoming => Season::Upcoming,
        }
    }
}
