//! Implementation of the `rowbot breaker` subcommands.

use rowbot_core::breaker::registry::BreakerRegistry;
use rowbot_core::breaker::CircuitState;
use rowbot_core::config::Config;
use rowbot_core::service::{PROVIDER_EMAIL, PROVIDER_LLM, PROVIDER_SCRAPE, PROVIDER_SEARCH};

use super::{BreakerCommands, CommandError};

/// Execute a `rowbot breaker` subcommand.
pub async fn execute(config: &Config, command: &BreakerCommands) -> Result<(), CommandError> {
    match command {
        BreakerCommands::Force { provider, state } => force(config, provider, state),
    }
}

/// Force a breaker's state through the registry admin API and print the
/// resulting row. Breakers are process-local singletons, so this acts on
/// the admin process; running services apply the same API in-process.
fn force(config: &Config, provider: &str, state: &str) -> Result<(), CommandError> {
    let known = [PROVIDER_SEARCH, PROVIDER_LLM, PROVIDER_SCRAPE, PROVIDER_EMAIL];
    if !known.contains(&provider) {
        return Err(CommandError::Misconfiguration(format!(
            "unknown provider '{provider}', expected one of: {}",
            known.join(", ")
        )));
    }

    let target: CircuitState = state
        .parse()
        .map_err(CommandError::Misconfiguration)?;

    let registry = BreakerRegistry::new(config.breaker.clone());
    registry.force_state(provider, target);

    let metrics = registry.get(provider).metrics();
    eprintln!(
        "breaker '{}' forced to {} (error rate {:.1}%, p50 {}ms)",
        metrics.provider,
        metrics.state,
        metrics.error_rate * 100.0,
        metrics.p50_ms,
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_provider() {
        let config = Config::default();
        let err = force(&config, "mystery", "open").unwrap_err();
        assert!(matches!(err, CommandError::Misconfiguration(_)));
    }

    #[test]
    fn rejects_unknown_state() {
        let config = Config::default();
        let err = force(&config, PROVIDER_SEARCH, "wedged").unwrap_err();
        assert!(matches!(err, CommandError::Misconfiguration(_)));
    }

    #[test]
    fn forces_known_provider_state() {
        let config = Config::default();
        assert!(force(&config, PROVIDER_SEARCH, "open").is_ok());
        assert!(force(&config, PROVIDER_EMAIL, "half_open").is_ok());
    }
}
