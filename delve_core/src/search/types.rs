use crate::classify::QueryClassification;
use crate::providers::Source;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_RESULTS: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    pub max_results: Option<usize>,
    /// Skip classification and start the chain at this backend
    pub force_backend: Option<String>,
    /// Keep only sources on these domains or their subdomains
    pub include_domains: Vec<String>,
    /// Drop sources on these domains or their subdomains
    pub exclude_domains: Vec<String>,
}

impl SearchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_results(mut self, n: usize) -> Self {
        self.max_results = Some(n);
        self
    }

    pub fn force_backend(mut self, backend: impl Into<String>) -> Self {
        self.force_backend = Some(backend.into());
        self
    }

    pub fn include_domain(mut self, domain: impl Into<String>) -> Self {
        self.include_domains.push(domain.into());
        self
    }

    pub fn exclude_domain(mut self, domain: impl Into<String>) -> Self {
        self.exclude_domains.push(domain.into());
        self
    }

    pub fn limit(&self) -> usize {
        self.max_results.unwrap_or(DEFAULT_MAX_RESULTS).max(1)
    }
}

/// Why a candidate backend did not produce the final result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    Unavailable,
    CircuitOpen,
    Empty,
    Failed { code: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackStep {
    pub backend: String,
    pub reason: SkipReason,
}

impl std::fmt::Display for FallbackStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.reason {
            SkipReason::Unavailable => write!(f, "{} unavailable", self.backend),
            SkipReason::CircuitOpen => write!(f, "{} circuit open", self.backend),
            SkipReason::Empty => write!(f, "{} returned no results", self.backend),
            SkipReason::Failed { code, .. } => write!(f, "{} failed ({code})", self.backend),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedSearchResult {
    pub query: String,
    pub sources: Vec<Source>,
    pub backend_used: String,
    pub classification: QueryClassification,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_computed_answer: Option<String>,
    pub result_count: usize,
    /// Matches the backend reported, before capping
    pub total_available: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallback_history: Vec<FallbackStep>,
    /// Served from cache (fresh or stale)
    pub cached: bool,
    pub duration_ms: u64,
    pub fetched_at: DateTime<Utc>,
}
