/// CLI subcommand argument definitions and implementations for Rowbot.
///
/// Each subcommand struct defines its flags and arguments matching the
/// operational CLI contract.
pub mod breaker;
pub mod cache;
pub mod health;

use clap::Args;

/// Errors commands map onto process exit codes.
#[derive(Debug)]
pub enum CommandError {
    /// Bad arguments or configuration (exit 1).
    Misconfiguration(String),
    /// The durable cache store could not be reached (exit 2).
    StoreUnreachable(String),
}

/// Arguments for the `health` subcommand.
#[derive(Debug, Args)]
pub struct HealthArgs {
    /// Emit the table as JSON instead of text
    #[arg(long)]
    pub json: bool,
}

/// Cache administration subcommands.
#[derive(Debug, clap::Subcommand)]
pub enum CacheCommands {
    /// Bump the cache version, invalidating every entry
    Bump,
}

/// Breaker administration subcommands.
#[derive(Debug, clap::Subcommand)]
pub enum BreakerCommands {
    /// Force a breaker's state
    Force {
        /// Provider name (serper, llm, scrape, prospeo)
        provider: String,
        /// Target state: closed, open, or half_open
        state: String,
    },
}
