//! CLI argument definitions for gameinsights.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `collect` | Collect and merge data for one or more Steam app ids |
//! | `sources` | List providers, lookup keys, credentials and quotas |
//! | `reviews` | Export the Steam review list of one app id |
//! | `users` | Steam user profiles with owned and recent games |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--format` | `json` | Output format (json, csv) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--output` | stdout | Write output to a file |
//! | `--quiet` | `false` | Only log errors to stderr |
//!
//! # Examples
//!
//! ```bash
//! # Full record for Dota 2
//! gameinsights collect --appid 570 --pretty
//!
//! # Recap of two games from three providers, as CSV
//! gameinsights collect --appid 570 --appid 730 --source steamstore \
//!     --source steamspy --source steamcharts --recap --format csv
//!
//! # Monthly active players, written to a file
//! gameinsights collect --appid 570 --mode active-player --output players.csv --format csv
//!
//! # First 500 negative English reviews
//! gameinsights reviews --appid 570 --review-type negative --review-language english --limit 500
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// gameinsights - Steam game data from many providers, merged into one record.
#[derive(Debug, Parser)]
#[command(
    name = "gameinsights",
    author,
    version,
    about = "Collect and merge Steam game data from multiple providers",
    long_about = "gameinsights fans each Steam app id out to several independent providers \
(Steam Store, Gamalytic, SteamSpy, SteamCharts, Steam reviews, Steam achievements, ProtonDB, \
HowLongToBeat) and merges the answers into one record with a fixed, versioned schema.\n\
\n\
Use 'gameinsights <command> --help' for command-specific help."
)]
pub struct Cli {
    /// Output format for results.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Write output to this file instead of stdout.
    #[arg(long, global = true)]
    pub output: Option<PathBuf>,

    /// Only log errors to stderr.
    #[arg(long, short, global = true, default_value_t = false)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Response envelope as JSON.
    Json,
    /// One row per record.
    Csv,
}

/// What `collect` emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CollectMode {
    /// One canonical (or recap) record per app id.
    Records,
    /// Wide monthly active-player table.
    ActivePlayer,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Collect and merge data for one or more app ids.
    ///
    /// # Examples
    ///
    ///   gameinsights collect --appid 570
    ///   gameinsights collect --appid 570 --source steamspy --recap
    Collect(CollectArgs),

    /// List known providers and their configuration state.
    Sources(ProviderArgs),

    /// Export the review list of one app id, following the review cursor.
    ///
    /// # Examples
    ///
    ///   gameinsights reviews --appid 570 --limit 200
    Reviews(ReviewsArgs),

    /// Fetch Steam user profiles (requires a Steam Web API key).
    ///
    /// # Examples
    ///
    ///   gameinsights users --steamid 76561198000000000 --steam-api-key KEY
    Users(UsersArgs),
}

/// Review ordering requested from Steam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReviewFilter {
    Recent,
    Updated,
    All,
}

impl ReviewFilter {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Recent => "recent",
            Self::Updated => "updated",
            Self::All => "all",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReviewType {
    All,
    Positive,
    Negative,
}

impl ReviewType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Positive => "positive",
            Self::Negative => "negative",
        }
    }
}

/// Arguments for the `reviews` command.
#[derive(Debug, Args)]
pub struct ReviewsArgs {
    /// Steam app id.
    #[arg(long)]
    pub appid: String,

    #[arg(long, value_enum, default_value_t = ReviewFilter::Recent)]
    pub filter: ReviewFilter,

    #[arg(long, value_enum, default_value_t = ReviewType::All)]
    pub review_type: ReviewType,

    /// Review language (`all` for every language).
    #[arg(long, default_value = "all")]
    pub review_language: String,

    /// Reviews per page, 1 to 100.
    #[arg(long, default_value_t = 100)]
    pub per_page: u32,

    /// Stop after this many reviews.
    #[arg(long)]
    pub limit: Option<usize>,

    #[command(flatten)]
    pub provider: ProviderArgs,
}

/// Arguments for the `users` command.
#[derive(Debug, Args)]
pub struct UsersArgs {
    /// 64-bit Steam account id; repeat for several.
    #[arg(long = "steamid", num_args = 1..)]
    pub steamids: Vec<String>,

    /// Leave played free-to-play games out of the owned list.
    #[arg(long, default_value_t = false)]
    pub exclude_free_games: bool,

    #[command(flatten)]
    pub provider: ProviderArgs,
}

/// Arguments for the `collect` command.
#[derive(Debug, Args)]
pub struct CollectArgs {
    /// Steam app id; repeat for several.
    #[arg(long = "appid", num_args = 1..)]
    pub appids: Vec<String>,

    /// Provider to query; repeat for several (default: all).
    #[arg(long = "source", num_args = 1..)]
    pub sources: Vec<String>,

    /// Emit the recap key set instead of the full record.
    #[arg(long, default_value_t = false)]
    pub recap: bool,

    #[arg(long, value_enum, default_value_t = CollectMode::Records)]
    pub mode: CollectMode,

    /// Fill value for missing cells in active-player mode.
    #[arg(long, default_value_t = -1, allow_hyphen_values = true)]
    pub fill_missing: i64,

    #[command(flatten)]
    pub provider: ProviderArgs,
}

/// Provider configuration flags; override environment variables.
#[derive(Debug, Args, Default)]
pub struct ProviderArgs {
    /// Steam Store region (country code).
    #[arg(long)]
    pub region: Option<String>,

    /// Steam Store and achievements language.
    #[arg(long)]
    pub language: Option<String>,

    /// Steam Web API key (required by steamachievements and users).
    #[arg(long)]
    pub steam_api_key: Option<String>,

    /// Gamalytic API key.
    #[arg(long)]
    pub gamalytic_api_key: Option<String>,

    /// Aggregate rate limit: identifiers per period.
    #[arg(long)]
    pub calls: Option<u32>,

    /// Aggregate rate-limit period in seconds.
    #[arg(long)]
    pub period: Option<u64>,

    /// Per-adapter fetch timeout in milliseconds.
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Identifiers collected concurrently.
    #[arg(long)]
    pub max_in_flight: Option<usize>,
}
