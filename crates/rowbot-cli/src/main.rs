/// Rowbot CLI - operational surface for the enrichment engine.
///
/// Entry point for the rowbot binary. Parses CLI arguments, initializes
/// logging, and dispatches to subcommand handlers.
///
/// Exit codes: 0 ok, 1 misconfiguration, 2 store unreachable.
mod commands;

use std::io::IsTerminal;

use clap::Parser;
use rowbot_core::config::Config;
use tracing_subscriber::EnvFilter;

/// Misconfiguration exit code.
const EXIT_MISCONFIG: i32 = 1;
/// Store-unreachable exit code.
const EXIT_STORE: i32 = 2;

/// Operational CLI for the Rowbot enrichment engine
#[derive(Parser)]
#[command(name = "rowbot")]
#[command(version)]
#[command(about = "Operational CLI for the Rowbot enrichment engine")]
#[command(after_help = "\
Common tasks:
  rowbot health                 — provider breakers, singleflight, cache
  rowbot cache bump             — invalidate every cache entry
  rowbot breaker force serper open — force a breaker state")]
struct Cli {
    /// Path to config.toml
    #[arg(
        short = 'c',
        long,
        global = true,
        default_value = "~/.rowbot/config.toml"
    )]
    config: String,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Print the operator health table
    Health(commands::HealthArgs),
    /// Cache administration
    Cache {
        #[command(subcommand)]
        command: commands::CacheCommands,
    },
    /// Circuit breaker administration
    Breaker {
        #[command(subcommand)]
        command: commands::BreakerCommands,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    let config = match Config::load_and_validate(Some(&cli.config)) {
        Ok(config) => config,
        Err(errors) => {
            for error in &errors {
                eprintln!("config error: {error}");
            }
            std::process::exit(EXIT_MISCONFIG);
        }
    };
    tracing::debug!(config = %cli.config, "configuration loaded");

    let outcome = match cli.command {
        Commands::Health(args) => commands::health::execute(&config, &args).await,
        Commands::Cache { command } => commands::cache::execute(&config, &command).await,
        Commands::Breaker { command } => commands::breaker::execute(&config, &command).await,
    };

    match outcome {
        Ok(()) => {}
        Err(commands::CommandError::Misconfiguration(message)) => {
            eprintln!("error: {message}");
            std::process::exit(EXIT_MISCONFIG);
        }
        Err(commands::CommandError::StoreUnreachable(message)) => {
            eprintln!("error: {message}");
            std::process::exit(EXIT_STORE);
        }
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let default_level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .init();
}
