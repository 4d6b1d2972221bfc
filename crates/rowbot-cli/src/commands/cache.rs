//! Implementation of the `rowbot cache` subcommands.

use rowbot_core::config::Config;

use super::{health, CacheCommands, CommandError};

/// Execute a `rowbot cache` subcommand.
pub async fn execute(config: &Config, command: &CacheCommands) -> Result<(), CommandError> {
    match command {
        CacheCommands::Bump => bump(config).await,
    }
}

/// Bump the cache version. Every existing entry becomes invisible; the new
/// version is persisted so running services pick it up on their next open.
async fn bump(config: &Config) -> Result<(), CommandError> {
    let cache = health::open_cache(config).await?;
    let old_version = cache.version();
    let new_version = cache.invalidate_all().await;
    eprintln!("cache version bumped: v{old_version} -> v{new_version}");
    Ok(())
}
