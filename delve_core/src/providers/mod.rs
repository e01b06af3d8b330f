//! Provider trait, shared result types and the provider registry.
//!
//! Every adapter is one REST call (occasionally two) reshaped into
//! [`Source`]s. Adapters do no retrying, caching or timeouts of their own;
//! the engine wraps them.

use crate::error::ProviderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

mod http;

pub mod datagov;
pub mod duckduckgo;
pub mod exa;
pub mod github;
pub mod hackernews;
pub mod met_museum;
pub mod nominatim;
pub mod openalex;
pub mod pubmed;
pub mod semantic_scholar;
pub mod tavily;
pub mod wikipedia;
pub mod wolfram;

/// One search hit, normalized across backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    /// Display ordering only, in [0, 1]
    pub quality_score: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl Source {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            content: String::new(),
            quality_score: 0.5,
            summary: None,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_quality(mut self, score: f32) -> Self {
        self.quality_score = score;
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        let summary = summary.into();
        self.summary = (!summary.trim().is_empty()).then_some(summary);
        self
    }
}

/// What a provider returns for one call. An empty `sources` list is a valid
/// answer, not an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderResults {
    pub sources: Vec<Source>,
    /// Total matches reported by the backend, if it reports one
    pub total: usize,
    /// Direct answer text (instant answers, computations)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

impl ProviderResults {
    pub fn new(sources: Vec<Source>, total: usize) -> Self {
        Self {
            sources,
            total,
            answer: None,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_answer(mut self, answer: Option<String>) -> Self {
        self.answer = answer.filter(|a| !a.trim().is_empty());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[async_trait]
pub trait Provider: Send + Sync {
    /// Backend id, as used in the catalog and rule table.
    fn id(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Whether required credentials are present (or none are needed).
    fn is_available(&self) -> bool {
        true
    }

    /// Search for `query`. `limit` is a soft cap.
    async fn search(&self, query: &str, limit: usize) -> Result<ProviderResults, ProviderError>;
}

/// Credentials read from the environment.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    values: HashMap<String, String>,
}

impl Credentials {
    pub const KNOWN_KEYS: &'static [&'static str] = &[
        "TAVILY_API_KEY",
        "EXA_API_KEY",
        "WOLFRAM_APP_ID",
        "SEMANTIC_SCHOLAR_API_KEY",
        "GITHUB_TOKEN",
        "NCBI_API_KEY",
        "ANTHROPIC_API_KEY",
    ];

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let values = Self::KNOWN_KEYS
            .iter()
            .filter_map(|&key| lookup(key).map(|v| (key.to_string(), v)))
            .collect();
        Self { values }
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }

    /// Non-blank value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderInfo {
    pub id: String,
    pub description: String,
    pub available: bool,
}

/// Name-indexed provider table, built once at startup.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in adapter. Credential-gated adapters register as
    /// unavailable when their credential is missing.
    pub fn with_defaults(credentials: &Credentials) -> Result<Self, ProviderError> {
        let mut registry = Self::new();
        registry.register_provider(Arc::new(duckduckgo::DuckDuckGoProvider::new()?));
        registry.register_provider(Arc::new(wikipedia::WikipediaProvider::new()?));
        registry.register_provider(Arc::new(semantic_scholar::SemanticScholarProvider::new(
            credentials,
        )?));
        registry.register_provider(Arc::new(openalex::OpenAlexProvider::new()?));
        registry.register_provider(Arc::new(pubmed::PubMedProvider::new(credentials)?));
        registry.register_provider(Arc::new(hackernews::HackerNewsProvider::new()?));
        registry.register_provider(Arc::new(github::GitHubProvider::new(credentials)?));
        registry.register_provider(Arc::new(nominatim::NominatimProvider::new()?));
        registry.register_provider(Arc::new(datagov::DataGovProvider::new()?));
        registry.register_provider(Arc::new(met_museum::MetMuseumProvider::new()?));
        registry.register_provider(Arc::new(wolfram::WolframProvider::new(credentials)?));
        registry.register_provider(Arc::new(tavily::TavilyProvider::new(credentials)?));
        registry.register_provider(Arc::new(exa::ExaProvider::new(credentials)?));
        Ok(registry)
    }

    pub fn register_provider(&mut self, provider: Arc<dyn Provider>) {
        self.providers.insert(provider.id().to_string(), provider);
    }

    /// Registered provider, available or not.
    pub fn get_provider(&self, id: &str) -> Option<&Arc<dyn Provider>> {
        self.providers.get(id)
    }

    /// Registered and available provider.
    pub fn resolve(&self, id: &str) -> Option<Arc<dyn Provider>> {
        self.providers
            .get(id)
            .filter(|p| p.is_available())
            .map(Arc::clone)
    }

    /// IDs of available providers, sorted.
    pub fn available(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .providers
            .values()
            .filter(|p| p.is_available())
            .map(|p| p.id().to_string())
            .collect();
        ids.sort();
        ids
    }

    pub fn status(&self) -> BTreeMap<String, bool> {
        self.providers
            .iter()
            .map(|(id, p)| (id.clone(), p.is_available()))
            .collect()
    }

    pub fn list_providers(&self) -> Vec<ProviderInfo> {
        let mut infos: Vec<ProviderInfo> = self
            .providers
            .values()
            .map(|p| ProviderInfo {
                id: p.id().to_string(),
                description: p.description().to_string(),
                available: p.is_available(),
            })
            .collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
