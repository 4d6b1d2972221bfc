/// Core library for the Rowbot row enrichment engine.
///
/// This crate contains all business logic: input classification, workflow
/// planning, the tool registry and tools, the reliability layer (cache,
/// singleflight, circuit breakers), provider adapters, configuration, and
/// error types used by the CLI binary and the job runner.
pub mod breaker;
pub mod cache;
pub mod classify;
pub mod config;
pub mod enrich;
pub mod error;
pub mod fields;
pub mod flight;
pub mod llm;
pub mod planner;
pub mod providers;
pub mod redact;
pub mod registry;
pub mod service;
pub mod tools;

#[cfg(any(test, feature = "test-helpers"))]
pub mod testkit;

pub use error::*;

/// Returns the version of the rowbot-core library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
