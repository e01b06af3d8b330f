//! The search engine: classification, fallback chains and the resilience
//! stack around every provider call.
//!
//! Per candidate backend the call path is
//!
//! ```text
//! dedup -> cache (stale: serve + background refresh) -> breaker -> retry -> timeout -> provider
//! ```
//!
//! and the result is normalized before it is cached.

use super::normalize::{normalize, shape};
use super::types::{FallbackStep, SearchOptions, SkipReason, UnifiedSearchResult};
use crate::catalog::BackendCatalog;
use crate::classify::{
    normalize_query, AnthropicModel, LanguageModel, ModelClassifier, PatternClassifier,
    QueryClassification, RuleTable,
};
use crate::config::EngineConfig;
use crate::error::{ConfigError, ProviderError, SearchError};
use crate::providers::{Credentials, Provider, ProviderRegistry, ProviderResults};
use crate::resilience::{
    BreakerSettings, Cache, CacheStats, CircuitBreakers, CircuitState, RequestDeduplicator,
    RetryPolicy, Revalidator,
};
use chrono::Utc;
use futures::future::join_all;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
struct Fetched {
    results: ProviderResults,
    cached: bool,
}

/// Composition root for a search process. Cheap to clone.
#[derive(Clone)]
pub struct SearchEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: EngineConfig,
    catalog: BackendCatalog,
    registry: ProviderRegistry,
    patterns: PatternClassifier,
    model: Option<ModelClassifier>,
    classifications: Mutex<HashMap<String, QueryClassification>>,
    cache: Cache<ProviderResults>,
    inflight: RequestDeduplicator<Fetched, SearchError>,
    breakers: CircuitBreakers,
    retry: RetryPolicy,
    revalidator: Revalidator,
}

#[derive(Default)]
pub struct SearchEngineBuilder {
    config: EngineConfig,
    catalog: Option<BackendCatalog>,
    rules: Option<RuleTable>,
    registry: Option<ProviderRegistry>,
    model: Option<Arc<dyn LanguageModel>>,
}

impl SearchEngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn catalog(mut self, catalog: BackendCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn rules(mut self, rules: RuleTable) -> Self {
        self.rules = Some(rules);
        self
    }

    pub fn registry(mut self, registry: ProviderRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn language_model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.model = Some(model);
        self
    }

    /// Load whatever was not supplied, then cross-check rules, catalog and
    /// registry.
    pub fn build(self) -> Result<SearchEngine, ConfigError> {
        let config = self.config;
        let catalog = match self.catalog {
            Some(c) => c,
            None => match &config.classifier.catalog_path {
                Some(path) => BackendCatalog::from_file(path)?,
                None => BackendCatalog::builtin()?,
            },
        };
        let rules = match self.rules {
            Some(r) => r,
            None => match &config.classifier.rules_path {
                Some(path) => RuleTable::from_file(path)?,
                None => RuleTable::builtin()?,
            },
        };
        let registry = match self.registry {
            Some(r) => r,
            None => ProviderRegistry::with_defaults(&Credentials::from_env())?,
        };

        config.validate()?;
        if !catalog.contains(&config.classifier.default_backend) {
            return Err(ConfigError::InvalidCatalog(format!(
                "default backend '{}' is not in the catalog",
                config.classifier.default_backend
            )));
        }
        for rule in rules.rules() {
            if !catalog.contains(&rule.backend) {
                return Err(ConfigError::InvalidRules(format!(
                    "rule '{}' targets '{}', which is not in the catalog",
                    rule.id, rule.backend
                )));
            }
        }
        if registry.resolve(catalog.terminal()).is_none() {
            return Err(ConfigError::InvalidCatalog(format!(
                "terminal backend '{}' has no available provider",
                catalog.terminal()
            )));
        }
        for id in catalog.ids() {
            if registry.get_provider(id).is_none() {
                warn!(target: "delve.dispatch", backend = id, "catalog backend has no provider");
            }
        }

        let model = self.model.map(|m| {
            let offered = catalog
                .backends()
                .iter()
                .map(|b| (b.id.clone(), b.description.clone()));
            ModelClassifier::new(m, offered)
        });
        let patterns = PatternClassifier::new(rules, config.classifier.default_backend.clone());
        let cache = Cache::new(
            config.cache.max_size,
            config.cache.ttl(),
            config.cache.stale_grace(),
        );
        let revalidator = Revalidator::new(
            config.cache.revalidate_workers,
            config.cache.revalidate_queue,
        );

        Ok(SearchEngine {
            inner: Arc::new(EngineInner {
                breakers: CircuitBreakers::new(BreakerSettings::from(&config.circuit)),
                retry: RetryPolicy::from(&config.retry),
                config,
                catalog,
                registry,
                patterns,
                model,
                classifications: Mutex::new(HashMap::new()),
                cache,
                inflight: RequestDeduplicator::new(),
                revalidator,
            }),
        })
    }
}

impl SearchEngine {
    pub fn builder() -> SearchEngineBuilder {
        SearchEngineBuilder::default()
    }

    /// Engine from the user's config file, environment credentials and, when
    /// `ANTHROPIC_API_KEY` is set, model classification.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = EngineConfig::load()?;
        let mut builder = Self::builder();
        match AnthropicModel::from_env(config.classifier.model.clone()) {
            Ok(model) => builder = builder.language_model(Arc::new(model)),
            Err(e) => debug!(target: "delve.classify", error = %e, "model classification disabled"),
        }
        builder.config(config).build()
    }

    pub fn catalog(&self) -> &BackendCatalog {
        &self.inner.catalog
    }

    pub fn rules(&self) -> &RuleTable {
        self.inner.patterns.table()
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.inner.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Classify without searching. Memoized per normalized query.
    pub async fn classify(&self, query: &str) -> QueryClassification {
        self.inner.classify(query).await
    }

    /// Classify `query`, then walk the chosen backend's fallback chain until
    /// a candidate produces a usable result.
    pub async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<UnifiedSearchResult, SearchError> {
        check_query(query)?;
        let classification = match &options.force_backend {
            Some(backend) => self.inner.forced(backend)?,
            None => self.inner.classify(query).await,
        };
        self.inner.dispatch(query, classification, options).await
    }

    /// Start at `backend` without classifying. Falls back like [`search`](Self::search).
    pub async fn search_with_provider(
        &self,
        query: &str,
        backend: &str,
        options: &SearchOptions,
    ) -> Result<UnifiedSearchResult, SearchError> {
        check_query(query)?;
        let classification = self.inner.forced(backend)?;
        self.inner.dispatch(query, classification, options).await
    }

    /// Query several backends concurrently, without fallback. Failed or
    /// unavailable backends are left out of the result.
    pub async fn search_multiple(
        &self,
        query: &str,
        backends: &[String],
        options: &SearchOptions,
    ) -> Vec<UnifiedSearchResult> {
        if check_query(query).is_err() {
            return Vec::new();
        }
        let mut unique: Vec<&str> = Vec::new();
        for backend in backends {
            if !unique.contains(&backend.as_str()) {
                unique.push(backend.as_str());
            }
        }
        let outcomes = join_all(
            unique
                .iter()
                .map(|backend| self.inner.search_single(query, backend, options)),
        )
        .await;
        outcomes
            .into_iter()
            .zip(unique)
            .filter_map(|(outcome, backend)| match outcome {
                Ok(result) => Some(result),
                Err(e) => {
                    debug!(target: "delve.dispatch", backend, error = %e, "dropped from multi-search");
                    None
                }
            })
            .collect()
    }

    /// Availability of every catalog backend.
    pub fn provider_status(&self) -> BTreeMap<String, bool> {
        self.inner
            .catalog
            .ids()
            .map(|id| (id.to_string(), self.inner.registry.resolve(id).is_some()))
            .collect()
    }

    /// Breaker state of every backend called so far.
    pub fn circuit_states(&self) -> BTreeMap<String, CircuitState> {
        self.inner.breakers.states()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.inner.cache.stats()
    }
}

fn check_query(query: &str) -> Result<(), SearchError> {
    if query.trim().is_empty() {
        return Err(SearchError::InvalidQuery("query is empty".to_string()));
    }
    Ok(())
}

fn cache_key(backend: &str, query: &str, limit: usize) -> String {
    format!("{backend}|{limit}|{}", normalize_query(query))
}

impl EngineInner {
    async fn classify(&self, query: &str) -> QueryClassification {
        let key = normalize_query(query);
        let memo = self
            .classifications
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
            .cloned();
        if let Some(hit) = memo {
            return hit;
        }

        let pattern = self.patterns.classify(&key);
        let threshold = self.config.classifier.confidence_threshold;
        let mut degraded_run = false;
        let mut classification = match &self.model {
            Some(model) if pattern.confidence < threshold => match model.classify(&key).await {
                Ok(c) => c,
                Err(e) => {
                    degraded_run = true;
                    let degraded = SearchError::ClassificationDegraded(e.to_string());
                    warn!(
                        target: "delve.classify",
                        code = degraded.code_str(),
                        error = %degraded,
                        fallback = %pattern.backend,
                        "using pattern classification"
                    );
                    pattern
                }
            },
            _ => pattern,
        };
        if classification.domain_hint.is_none() {
            classification.domain_hint = self
                .catalog
                .category(&classification.backend)
                .map(|c| c.to_string());
        }
        debug!(
            target: "delve.classify",
            backend = %classification.backend,
            confidence = classification.confidence,
            source = ?classification.source,
            "classified"
        );

        // Degraded answers are not memoized; the next call asks the model again
        if !degraded_run {
            self.classifications
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(key, classification.clone());
        }
        classification
    }

    fn forced(&self, backend: &str) -> Result<QueryClassification, SearchError> {
        if !self.catalog.contains(backend) {
            return Err(SearchError::UnknownBackend(backend.to_string()));
        }
        let mut classification = QueryClassification::forced(backend);
        classification.domain_hint = self.catalog.category(backend).map(|c| c.to_string());
        Ok(classification)
    }

    async fn dispatch(
        self: &Arc<Self>,
        query: &str,
        classification: QueryClassification,
        options: &SearchOptions,
    ) -> Result<UnifiedSearchResult, SearchError> {
        let started = Instant::now();
        let limit = options.limit();
        let mut candidates = vec![classification.backend.clone()];
        candidates.extend(self.catalog.chain(&classification.backend));

        let mut history = Vec::new();
        let mut last_failure = None;
        let count = candidates.len();
        for (i, backend) in candidates.into_iter().enumerate() {
            let Some(provider) = self.registry.resolve(&backend) else {
                debug!(target: "delve.dispatch", backend = %backend, "unavailable, skipping");
                history.push(FallbackStep {
                    backend: backend.clone(),
                    reason: SkipReason::Unavailable,
                });
                last_failure = Some(SearchError::ProviderUnavailable(backend.clone()));
                continue;
            };

            match self.fetch(&backend, provider, query, limit).await {
                Ok(fetched) => {
                    let sources = shape(fetched.results.sources.clone(), options);
                    let is_last = i + 1 == count;
                    if sources.is_empty() && self.catalog.is_fallback_eligible(&backend) && !is_last {
                        debug!(target: "delve.dispatch", backend = %backend, "no results, falling back");
                        history.push(FallbackStep {
                            backend,
                            reason: SkipReason::Empty,
                        });
                        continue;
                    }
                    let result = finish(
                        query,
                        classification,
                        backend,
                        sources,
                        fetched,
                        history,
                        started,
                    );
                    info!(
                        target: "delve.dispatch",
                        backend = %result.backend_used,
                        results = result.result_count,
                        fallbacks = result.fallback_history.len(),
                        cached = result.cached,
                        duration_ms = result.duration_ms,
                        "search complete"
                    );
                    return Ok(result);
                }
                Err(err) => {
                    warn!(
                        target: "delve.dispatch",
                        backend = %backend,
                        code = err.code_str(),
                        error = %err,
                        "candidate failed"
                    );
                    let reason = match &err {
                        SearchError::CircuitOpen(_) => SkipReason::CircuitOpen,
                        other => SkipReason::Failed {
                            code: other.code_str().to_string(),
                            message: other.to_string(),
                        },
                    };
                    history.push(FallbackStep {
                        backend: backend.clone(),
                        reason,
                    });
                    last_failure = Some(err);
                }
            }
        }

        let attempted: Vec<String> = history.iter().map(|s| s.backend.clone()).collect();
        let last_backend = attempted
            .last()
            .cloned()
            .unwrap_or_else(|| classification.backend.clone());
        let cause = last_failure
            .unwrap_or_else(|| SearchError::ProviderUnavailable(last_backend.clone()));
        warn!(
            target: "delve.dispatch",
            last_backend = %last_backend,
            attempted = attempted.len(),
            "fallback chain exhausted"
        );
        Err(SearchError::ChainExhausted {
            last_backend,
            cause: Box::new(cause),
            attempted,
        })
    }

    async fn search_single(
        self: &Arc<Self>,
        query: &str,
        backend: &str,
        options: &SearchOptions,
    ) -> Result<UnifiedSearchResult, SearchError> {
        let started = Instant::now();
        let classification = self.forced(backend)?;
        let provider = self
            .registry
            .resolve(backend)
            .ok_or_else(|| SearchError::ProviderUnavailable(backend.to_string()))?;
        let fetched = self.fetch(backend, provider, query, options.limit()).await?;
        let sources = shape(fetched.results.sources.clone(), options);
        Ok(finish(
            query,
            classification,
            backend.to_string(),
            sources,
            fetched,
            Vec::new(),
            started,
        ))
    }

    /// One backend call behind dedup and cache.
    async fn fetch(
        self: &Arc<Self>,
        backend: &str,
        provider: Arc<dyn Provider>,
        query: &str,
        limit: usize,
    ) -> Result<Fetched, SearchError> {
        let key = cache_key(backend, query, limit);
        let inner = Arc::clone(self);
        let backend = backend.to_string();
        let query = query.to_string();
        let owned_key = key.clone();
        self.inflight
            .execute(&key, move || async move {
                inner
                    .fetch_cached(&backend, provider, &query, limit, &owned_key)
                    .await
            })
            .await
    }

    async fn fetch_cached(
        self: &Arc<Self>,
        backend: &str,
        provider: Arc<dyn Provider>,
        query: &str,
        limit: usize,
        key: &str,
    ) -> Result<Fetched, SearchError> {
        if let Some(hit) = self.cache.get(key) {
            if hit.stale {
                self.schedule_refresh(backend, provider, query, limit, key);
            }
            return Ok(Fetched {
                results: hit.value,
                cached: true,
            });
        }
        let results = self.fetch_live(backend, provider.as_ref(), query, limit).await?;
        self.cache.set(key, results.clone(), None);
        Ok(Fetched {
            results,
            cached: false,
        })
    }

    fn schedule_refresh(
        self: &Arc<Self>,
        backend: &str,
        provider: Arc<dyn Provider>,
        query: &str,
        limit: usize,
        key: &str,
    ) {
        let inner = Arc::clone(self);
        let backend = backend.to_string();
        let query = query.to_string();
        let owned_key = key.to_string();
        let queued = self.revalidator.schedule(key, async move {
            match inner.fetch_live(&backend, provider.as_ref(), &query, limit).await {
                Ok(results) => inner.cache.set(owned_key, results, None),
                Err(e) => {
                    debug!(target: "delve.revalidate", backend = %backend, error = %e, "refresh failed")
                }
            }
        });
        debug!(target: "delve.cache", key, queued, "stale hit");
    }

    /// Breaker, retry and timeout around a single provider call.
    ///
    /// Only retryable failures count against the breaker; a rejected request
    /// says nothing about the backend's health.
    async fn fetch_live(
        &self,
        backend: &str,
        provider: &dyn Provider,
        query: &str,
        limit: usize,
    ) -> Result<ProviderResults, SearchError> {
        let breaker = self.breakers.get(backend);
        if !breaker.allow() {
            return Err(SearchError::CircuitOpen(backend.to_string()));
        }

        let timeout = self.catalog.timeout(backend, self.config.default_timeout());
        let outcome = self
            .retry
            .execute(backend, || async move {
                match tokio::time::timeout(timeout, provider.search(query, limit)).await {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Timeout(timeout)),
                }
            })
            .await;

        match outcome {
            Ok(results) => {
                breaker.record_success();
                Ok(normalize(results))
            }
            Err(e) => {
                if e.is_retryable() {
                    breaker.record_failure();
                }
                Err(SearchError::from_provider(backend, e))
            }
        }
    }
}

fn finish(
    query: &str,
    mut classification: QueryClassification,
    backend: String,
    sources: Vec<crate::providers::Source>,
    fetched: Fetched,
    history: Vec<FallbackStep>,
    started: Instant,
) -> UnifiedSearchResult {
    if !history.is_empty() {
        let steps: Vec<String> = history.iter().map(ToString::to_string).collect();
        classification.reason = format!(
            "{} [fallback: {}; used {backend}]",
            classification.reason,
            steps.join("; ")
        );
    }
    let total_available = fetched.results.total.max(fetched.results.sources.len());
    UnifiedSearchResult {
        query: query.to_string(),
        result_count: sources.len(),
        sources,
        backend_used: backend,
        classification,
        pre_computed_answer: fetched.results.answer,
        total_available,
        fallback_history: history,
        cached: fetched.cached,
        duration_ms: started.elapsed().as_millis() as u64,
        fetched_at: Utc::now(),
    }
}
