// src/lib.rs
//! Query classification and multi-provider search orchestration.
//!
//! A [`SearchEngine`] classifies a query against a priority-ordered rule
//! table (optionally consulting a language model when unsure), picks a
//! backend, and walks that backend's fallback chain until some provider
//! returns usable results. Every provider call goes through request
//! deduplication, a TTL/LRU cache with stale-while-revalidate, a per-backend
//! circuit breaker, and retry with backoff.
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use delve_core::{SearchEngine, SearchOptions};
//!
//! let engine = SearchEngine::from_env()?;
//! let result = engine
//!     .search("papers on transformer attention", &SearchOptions::new().max_results(5))
//!     .await?;
//! println!("{} results from {}", result.result_count, result.backend_used);
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod classify;
pub mod config;
pub mod error;
pub mod providers;
pub mod resilience;
pub mod search;
pub mod utils;

pub use catalog::{BackendCatalog, BackendCategory, BackendSpec};
pub use classify::{
    ClassificationRule, ClassificationSource, LanguageModel, QueryClassification, RuleTable,
    SearchMode,
};
pub use config::EngineConfig;
pub use error::{ConfigError, ModelError, ProviderError, SearchError};
pub use providers::{Credentials, Provider, ProviderRegistry, ProviderResults, Source};
pub use resilience::{CacheStats, CircuitState};
pub use search::{
    FallbackStep, SearchEngine, SearchEngineBuilder, SearchOptions, SkipReason,
    UnifiedSearchResult,
};
