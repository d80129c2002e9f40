//! CLI argument definitions for ferroquote.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `quote` | Latest quote for one or more symbols |
//! | `history` | Daily OHLCV history for a symbol |
//! | `profile` | Company profile for a symbol |
//! | `status` | Cache, coalescing and provider health |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--mode` | from environment, else `auto` | Provider mode |
//! | `--timeout-ms` | from environment, else `10000` | Caller timeout in ms |
//! | `--pretty` | `false` | Pretty-print JSON output |
//!
//! # Examples
//!
//! ```bash
//! ferroquote quote RELIANCE TCS --pretty
//! ferroquote --mode synthetic history INFY
//! ferroquote --mode primary --timeout-ms 2000 profile HDFCBANK
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use ferroquote_core::ProviderMode;

/// Resilient market data for NSE-listed stocks.
#[derive(Debug, Parser)]
#[command(
    name = "ferroquote",
    author,
    version,
    about = "Resilient market data CLI",
    long_about = "ferroquote fetches quotes, daily history and company profiles. Results are \
cached in memory, concurrent requests are coalesced, and when the primary provider (Twelve Data) \
fails the request falls back to the secondary (Finnhub) and finally to deterministic synthetic \
data.\n\
\n\
Provider keys are read from TWELVEDATA_API_KEY and FINNHUB_API_KEY, or a .env file."
)]
pub struct Cli {
    /// Provider mode; overrides FERROQUOTE_PROVIDER_MODE.
    #[arg(long, global = true, value_enum)]
    pub mode: Option<ModeSelector>,

    /// Caller timeout budget in milliseconds; overrides FERROQUOTE_REQUEST_TIMEOUT_MS.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Provider mode as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeSelector {
    /// Primary, then secondary, then synthetic.
    Auto,
    /// Twelve Data only; its errors are returned as-is.
    Primary,
    /// Finnhub only; its errors are returned as-is.
    Secondary,
    /// Generated data only.
    Synthetic,
}

impl From<ModeSelector> for ProviderMode {
    fn from(value: ModeSelector) -> Self {
        match value {
            ModeSelector::Auto => Self::Auto,
            ModeSelector::Primary => Self::PrimaryOnly,
            ModeSelector::Secondary => Self::SecondaryOnly,
            ModeSelector::Synthetic => Self::SyntheticOnly,
        }
    }
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch the latest quote for one or more symbols.
    ///
    /// Symbols are fetched concurrently; a failure for one symbol is reported
    /// in `errors` without hiding the others.
    ///
    /// # Examples
    ///
    ///   ferroquote quote RELIANCE
    ///   ferroquote quote RELIANCE TCS INFY --pretty
    Quote(QuoteArgs),

    /// Fetch daily OHLCV history.
    ///
    /// # Examples
    ///
    ///   ferroquote history TCS
    History(SymbolArgs),

    /// Fetch a company profile.
    ///
    /// # Examples
    ///
    ///   ferroquote profile HDFCBANK
    Profile(SymbolArgs),

    /// Show cache, coalescing and provider health counters.
    Status,
}

/// Arguments for the `quote` command.
#[derive(Debug, Args)]
pub struct QuoteArgs {
    /// One or more symbols (e.g., RELIANCE, TCS.NS).
    #[arg(required = true, num_args = 1..)]
    pub symbols: Vec<String>,
}

/// Arguments for single-symbol commands.
#[derive(Debug, Args)]
pub struct SymbolArgs {
    /// Market symbol.
    pub symbol: String,
}
