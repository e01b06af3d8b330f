#![allow(dead_code)]

use async_trait::async_trait;
use delve_core::{
    EngineConfig, LanguageModel, ModelError, Provider, ProviderError, ProviderRegistry,
    ProviderResults, SearchEngine, Source,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Reply = Result<ProviderResults, ProviderError>;

/// A provider that plays back queued replies, then repeats a default one.
pub struct ScriptedProvider {
    id: &'static str,
    available: bool,
    delay: Duration,
    script: Mutex<VecDeque<Reply>>,
    fallback: Reply,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(id: &'static str) -> Self {
        Self {
            id,
            available: true,
            delay: Duration::ZERO,
            script: Mutex::new(VecDeque::new()),
            fallback: Ok(ProviderResults::empty()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Always answers with `n` sources on `host`.
    pub fn returning(id: &'static str, n: usize, host: &str) -> Arc<Self> {
        Arc::new(Self::new(id).always(Ok(results(n, host))))
    }

    pub fn empty(id: &'static str) -> Arc<Self> {
        Arc::new(Self::new(id))
    }

    pub fn failing(id: &'static str, err: ProviderError) -> Arc<Self> {
        Arc::new(Self::new(id).always(Err(err)))
    }

    pub fn unavailable(id: &'static str) -> Arc<Self> {
        Arc::new(Self {
            available: false,
            ..Self::new(id)
        })
    }

    pub fn always(mut self, reply: Reply) -> Self {
        self.fallback = reply;
        self
    }

    pub fn then(self, reply: Reply) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(reply);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn id(&self) -> &'static str {
        self.id
    }

    fn description(&self) -> &'static str {
        "scripted test provider"
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn search(&self, _query: &str, _limit: usize) -> Result<ProviderResults, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

pub fn results(n: usize, host: &str) -> ProviderResults {
    let sources = (0..n)
        .map(|i| {
            Source::new(format!("https://{host}/item/{i}"), format!("{host} result {i}"))
                .with_content(format!("content {i}"))
                .with_quality(1.0 - i as f32 * 0.1)
        })
        .collect();
    ProviderResults::new(sources, n * 10)
}

pub fn registry(providers: &[Arc<ScriptedProvider>]) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    for p in providers {
        registry.register_provider(p.clone());
    }
    registry
}

/// Defaults with retries off, so failures are observed on the first call.
pub fn test_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.retry.max_retries = 0;
    config.retry.base_delay_ms = 10;
    config.retry.max_delay_ms = 100;
    config
}

pub fn engine(providers: &[Arc<ScriptedProvider>]) -> SearchEngine {
    engine_with(test_config(), providers)
}

pub fn engine_with(config: EngineConfig, providers: &[Arc<ScriptedProvider>]) -> SearchEngine {
    SearchEngine::builder()
        .config(config)
        .registry(registry(providers))
        .build()
        .unwrap()
}

/// A language model with a fixed reply that counts its calls.
pub struct FixedModel {
    reply: Result<String, ModelError>,
    outages: AtomicUsize,
    calls: AtomicUsize,
}

impl FixedModel {
    pub fn new(reply: Result<&str, ModelError>) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.map(str::to_string),
            outages: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        })
    }

    /// Fails the first `outages` calls with HTTP 529, then replies.
    pub fn recovering(outages: usize, reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply.to_string()),
            outages: AtomicUsize::new(outages),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageModel for FixedModel {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn complete(&self, _system: &str, _prompt: &str) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let outage = self
            .outages
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if outage {
            return Err(ModelError::Status(529));
        }
        self.reply.clone()
    }
}
