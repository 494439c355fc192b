//! CLI argument parsing and command definitions.

use clap::{Args, Parser, Subcommand};
use hearth_vector::SortOrder;

// ============================================================================
// CLI argument types
// ============================================================================

/// Hybrid semantic/keyword search over property listings.
#[derive(Parser, Debug)]
#[command(name = "hearth", author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file.
    #[arg(short, long, env = "HEARTH_CONFIG")]
    pub config: Option<String>,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress non-essential output.
    #[arg(short, long)]
    pub quiet: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Index listings from a JSON file (an array of listing objects).
    Index {
        /// Path to the JSON file.
        file: String,

        /// Documents per embedding batch (defaults to the configured size).
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Clear the store before indexing.
        #[arg(long)]
        replace: bool,
    },

    /// Search indexed listings.
    Search(SearchArgs),

    /// Fetch listings by id.
    Get {
        /// Listing ids.
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Delete every listing scraped from a source URL.
    Delete {
        /// Source URL.
        #[arg(long)]
        source: String,
    },

    /// Show index statistics.
    Stats,

    /// Remove every indexed listing.
    Clear,

    /// Print version information.
    Version,

    /// Configuration operations.
    Config(ConfigCommand),
}

/// Arguments for `hearth search`.
#[derive(Args, Debug, Default)]
pub struct SearchArgs {
    /// Free-text query (may be empty when filtering only).
    #[arg(default_value = "")]
    pub query: String,

    /// Number of results.
    #[arg(short, long)]
    pub k: Option<usize>,

    /// Vector weight in [0, 1].
    #[arg(short, long)]
    pub alpha: Option<f64>,

    /// Filter as `key=value`; JSON values are parsed (`rooms=2`,
    /// `has_garden=true`, `energy_ratings=["A","B"]`), anything else is a string.
    #[arg(short, long = "filter", value_name = "KEY=VALUE")]
    pub filters: Vec<String>,

    /// Radius center latitude.
    #[arg(long, allow_hyphen_values = true)]
    pub lat: Option<f64>,

    /// Radius center longitude.
    #[arg(long, allow_hyphen_values = true)]
    pub lon: Option<f64>,

    /// Radius in kilometres.
    #[arg(long)]
    pub radius_km: Option<f64>,

    /// Metadata field to sort by.
    #[arg(short, long)]
    pub sort_by: Option<String>,

    /// Sort direction.
    #[arg(short, long, default_value = "desc")]
    pub order: SortOrder,

    /// Print results as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Config-specific subcommands.
#[derive(Parser, Debug)]
pub struct ConfigCommand {
    /// Config subcommand to execute.
    #[command(subcommand)]
    pub command: ConfigAction,
}

/// Available config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the resolved config file path.
    Path,

    /// Print the resolved configuration as TOML.
    Show,

    /// Create a default configuration file.
    Init {
        /// Output file path (defaults to XDG config path).
        #[arg(short, long)]
        file: Option<String>,

        /// Overwrite existing file.
        #[arg(long)]
        force: bool,
    },

    /// Export configuration as environment variables.
    Export {
        /// Format as Docker --env flags.
        #[arg(long)]
        docker_env: bool,
    },
}

// ============================================================================
// Tests
// ============================================================================
