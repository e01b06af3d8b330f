// src/error.rs
use std::time::Duration;

/// Failure reported by a single provider adapter.
///
/// Cloneable so that callers sharing a deduplicated request all observe the
/// same error value.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("Rate limited by {backend}")]
    RateLimited {
        backend: String,
        retry_after: Option<Duration>,
    },

    #[error("Upstream error from {backend}: HTTP {status}")]
    Upstream { backend: String, status: u16 },

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request rejected by {backend}: HTTP {status}")]
    Rejected { backend: String, status: u16 },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Missing credential: {0}")]
    MissingCredential(&'static str),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl ProviderError {
    /// Map an HTTP status to the matching error class.
    ///
    /// 429 and 5xx are transient, every other non-success status is permanent.
    pub fn from_status(backend: &str, status: reqwest::StatusCode) -> Self {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            ProviderError::RateLimited {
                backend: backend.to_string(),
                retry_after: None,
            }
        } else if status.is_server_error() {
            ProviderError::Upstream {
                backend: backend.to_string(),
                status: status.as_u16(),
            }
        } else {
            ProviderError::Rejected {
                backend: backend.to_string(),
                status: status.as_u16(),
            }
        }
    }

    /// Whether the retrier may try this call again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited { .. }
                | ProviderError::Upstream { .. }
                | ProviderError::Timeout(_)
                | ProviderError::Network(_)
        )
    }

    pub fn code_str(&self) -> &'static str {
        match self {
            ProviderError::RateLimited { .. } => "rate_limited",
            ProviderError::Upstream { .. } => "upstream_error",
            ProviderError::Timeout(_) => "timeout",
            ProviderError::Network(_) => "network_error",
            ProviderError::Rejected { .. } => "rejected",
            ProviderError::InvalidQuery(_) => "invalid_query",
            ProviderError::MissingCredential(_) => "auth_missing",
            ProviderError::Parse(_) => "parse_error",
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout(Duration::ZERO)
        } else if err.is_decode() {
            ProviderError::Parse(err.to_string())
        } else if let Some(status) = err.status() {
            ProviderError::from_status("http", status)
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::Parse(err.to_string())
    }
}

/// Failures from the language-model classifier. Never surfaced to search
/// callers; the engine degrades to the pattern result instead.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ModelError {
    #[error("Missing credential: {0}")]
    MissingCredential(&'static str),

    #[error("Model request failed: {0}")]
    Transport(String),

    #[error("Model service returned HTTP {0}")]
    Status(u16),

    #[error("Malformed model response: {0}")]
    Malformed(String),

    #[error("Model suggested unknown backend '{0}'")]
    UnknownBackend(String),
}

impl ModelError {
    pub fn code_str(&self) -> &'static str {
        match self {
            ModelError::MissingCredential(_) => "auth_missing",
            ModelError::Transport(_) => "transport_error",
            ModelError::Status(_) => "http_error",
            ModelError::Malformed(_) => "malformed_response",
            ModelError::UnknownBackend(_) => "unknown_backend",
        }
    }
}

impl From<reqwest::Error> for ModelError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => ModelError::Status(status.as_u16()),
            None => ModelError::Transport(err.to_string()),
        }
    }
}

/// Errors produced by the orchestration layer.
///
/// Only `ChainExhausted` (and `UnknownBackend` for explicit backend requests)
/// ever reaches a caller of `SearchEngine::search`; the other variants steer
/// which candidate is tried next.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SearchError {
    #[error("Classification degraded: {0}")]
    ClassificationDegraded(String),

    #[error("Provider '{0}' is unavailable")]
    ProviderUnavailable(String),

    #[error("Circuit open for '{0}'")]
    CircuitOpen(String),

    #[error("Transient failure from '{backend}': {source}")]
    Transient {
        backend: String,
        #[source]
        source: ProviderError,
    },

    #[error("Permanent failure from '{backend}': {source}")]
    Permanent {
        backend: String,
        #[source]
        source: ProviderError,
    },

    #[error("All candidates failed; last tried '{last_backend}': {cause}")]
    ChainExhausted {
        last_backend: String,
        cause: Box<SearchError>,
        attempted: Vec<String>,
    },

    #[error("Unknown backend '{0}'")]
    UnknownBackend(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

impl SearchError {
    /// Classify a provider failure for a given backend.
    pub fn from_provider(backend: &str, source: ProviderError) -> Self {
        if source.is_retryable() {
            SearchError::Transient {
                backend: backend.to_string(),
                source,
            }
        } else {
            SearchError::Permanent {
                backend: backend.to_string(),
                source,
            }
        }
    }

    pub fn code_str(&self) -> &'static str {
        match self {
            SearchError::ClassificationDegraded(_) => "classification_degraded",
            SearchError::ProviderUnavailable(_) => "provider_unavailable",
            SearchError::CircuitOpen(_) => "circuit_open",
            SearchError::Transient { .. } => "transient_backend_error",
            SearchError::Permanent { .. } => "permanent_backend_error",
            SearchError::ChainExhausted { .. } => "chain_exhausted",
            SearchError::UnknownBackend(_) => "unknown_backend",
            SearchError::InvalidQuery(_) => "invalid_query",
        }
    }
}

/// Failures while loading configuration, the rule table or the backend catalog.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid pattern in rule '{rule}': {source}")]
    Pattern {
        rule: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid rule table: {0}")]
    InvalidRules(String),

    #[error("Invalid backend catalog: {0}")]
    InvalidCatalog(String),

    #[error("Invalid setting {key}: {reason}")]
    InvalidSetting { key: &'static str, reason: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidEnv { key: String, value: String },

    #[error("Provider setup failed: {0}")]
    ProviderSetup(#[from] ProviderError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_status_mapping() {
        let e = ProviderError::from_status("exa", StatusCode::TOO_MANY_REQUESTS);
        assert!(e.is_retryable());
        assert_eq!(e.code_str(), "rate_limited");

        let e = ProviderError::from_status("exa", StatusCode::BAD_GATEWAY);
        assert!(e.is_retryable());

        let e = ProviderError::from_status("exa", StatusCode::BAD_REQUEST);
        assert!(!e.is_retryable());
        assert_eq!(e.code_str(), "rejected");
    }

    #[test]
    fn test_from_provider_splits_on_retryability() {
        let err = SearchError::from_provider("wikipedia", ProviderError::Timeout(Duration::ZERO));
        assert_eq!(err.code_str(), "transient_backend_error");

        let err = SearchError::from_provider(
            "wikipedia",
            ProviderError::InvalidQuery("empty".to_string()),
        );
        assert_eq!(err.code_str(), "permanent_backend_error");
    }
}
