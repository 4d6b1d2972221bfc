//! Implementation of the `rowbot health` command.
//!
//! Prints the operator health table: per-provider breaker state, error
//! rate, p50 latency and average cost, singleflight stats, cache stats,
//! and which provider credentials are configured (masked).

use rowbot_core::cache::store::SqliteStore;
use rowbot_core::cache::Cache;
use rowbot_core::config::Config;
use rowbot_core::redact::mask_secret;
use rowbot_core::service::{
    Services, PROVIDER_EMAIL, PROVIDER_LLM, PROVIDER_SCRAPE, PROVIDER_SEARCH,
};

use super::{CommandError, HealthArgs};

/// Execute the `rowbot health` command.
pub async fn execute(config: &Config, args: &HealthArgs) -> Result<(), CommandError> {
    // A configured-but-unreachable store is an operational error the
    // operator needs to see, not a silent fallback.
    if !config.cache.db_path.is_empty() {
        if let Err(e) = SqliteStore::open(&config.cache.db_path).await {
            return Err(CommandError::StoreUnreachable(format!(
                "cache store at {}: {e}",
                config.cache.db_path
            )));
        }
    }

    let services = Services::init(config.clone()).await;

    // Materialize the well-known breakers so the table is complete even
    // before any traffic.
    for provider in [PROVIDER_SEARCH, PROVIDER_LLM, PROVIDER_SCRAPE, PROVIDER_EMAIL] {
        let _ = services.breakers.get(provider);
    }

    let breakers = services.breakers.metrics_table();
    let flights = services.provider_flights.stats();
    let cache_stats = services.cache.stats();

    if args.json {
        let payload = serde_json::json!({
            "breakers": breakers,
            "singleflight": flights,
            "cache": {
                "version": services.cache.version(),
                "stats": cache_stats,
            },
        });
        println!("{}", serde_json::to_string_pretty(&payload).unwrap_or_default());
        return Ok(());
    }

    eprintln!();
    eprintln!("=== Rowbot Health ===");
    eprintln!();

    eprintln!("--- Providers ---");
    eprintln!(
        "  {:<10} {:<10} {:>7} {:>9} {:>9} {:>10}",
        "provider", "state", "calls", "err rate", "p50 (ms)", "avg cost"
    );
    for m in &breakers {
        eprintln!(
            "  {:<10} {:<10} {:>7} {:>8.1}% {:>9} {:>9.1}c",
            m.provider,
            m.state.to_string(),
            m.total,
            m.error_rate * 100.0,
            m.p50_ms,
            m.avg_cost_cents,
        );
    }

    eprintln!();
    eprintln!("--- Singleflight ---");
    eprintln!(
        "  total: {} | coalesced: {} | executed: {} | errors: {} | mean waiters: {:.2}",
        flights.total, flights.coalesced, flights.executed, flights.errors, flights.mean_waiters
    );

    eprintln!();
    eprintln!("--- Cache ---");
    eprintln!(
        "  version: v{} | hits: {} | misses: {} | negative hits: {} | sets: {} | store errors: {}",
        services.cache.version(),
        cache_stats.hits,
        cache_stats.misses,
        cache_stats.negative_hits,
        cache_stats.sets,
        cache_stats.store_errors,
    );

    eprintln!();
    eprintln!("--- Credentials ---");
    eprintln!(
        "  serper: {} | prospeo: {} | llm ({}): {}",
        mask_optional(&config.providers.serper_api_key),
        mask_optional(&config.providers.prospeo_api_key),
        if config.llm.provider.is_empty() {
            "unset"
        } else {
            &config.llm.provider
        },
        mask_optional(&config.llm.api_key),
    );
    eprintln!();

    Ok(())
}

fn mask_optional(secret: &Option<String>) -> String {
    match secret {
        Some(s) => mask_secret(s),
        None => "(not set)".to_string(),
    }
}

/// Build the cache directly (used by cache admin commands too).
pub async fn open_cache(config: &Config) -> Result<Cache, CommandError> {
    if config.cache.db_path.is_empty() {
        return Ok(Cache::with_store(&config.cache, None).await);
    }
    let store = SqliteStore::open(&config.cache.db_path)
        .await
        .map_err(|e| {
            CommandError::StoreUnreachable(format!("cache store at {}: {e}", config.cache.db_path))
        })?;
    Ok(Cache::with_store(&config.cache, Some(std::sync::Arc::new(store))).await)
}
