mod engine;
mod normalize;
mod types;

pub use engine::{SearchEngine, SearchEngineBuilder};
pub use normalize::{normalize, shape, CONTENT_LIMIT};
pub use types::{FallbackStep, SearchOptions, SkipReason, UnifiedSearchResult, DEFAULT_MAX_RESULTS};
