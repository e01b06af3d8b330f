//! HTTP plumbing shared by the adapters.

use crate::error::ProviderError;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

pub(crate) const USER_AGENT: &str = concat!("delve/", env!("CARGO_PKG_VERSION"));

/// Client with a generous transport timeout; the engine enforces the
/// per-backend one.
pub(crate) fn client() -> Result<Client, ProviderError> {
    Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(60))
        .build()
        .map_err(|e| ProviderError::Network(e.to_string()))
}

/// Send `req`, turning non-success statuses into [`ProviderError`]s.
pub(crate) async fn send(backend: &str, req: RequestBuilder) -> Result<Response, ProviderError> {
    let resp = req.send().await?;
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        return Err(ProviderError::RateLimited {
            backend: backend.to_string(),
            retry_after,
        });
    }
    Err(ProviderError::from_status(backend, status))
}

/// Send `req` and decode the JSON body.
pub(crate) async fn get_json<T: DeserializeOwned>(
    backend: &str,
    req: RequestBuilder,
) -> Result<T, ProviderError> {
    let body = send(backend, req).await?.text().await?;
    serde_json::from_str(&body).map_err(|e| ProviderError::Parse(format!("{backend}: {e}")))
}

/// Trimmed query, or `InvalidQuery` when blank.
pub(crate) fn require_query(query: &str) -> Result<&str, ProviderError> {
    let q = query.trim();
    if q.is_empty() {
        return Err(ProviderError::InvalidQuery("query is empty".to_string()));
    }
    Ok(q)
}

/// Score by position for backends that return relevance order but no score:
/// 1.0 for the first hit, sliding towards 0.5.
pub(crate) fn rank_score(rank: usize, count: usize) -> f32 {
    if count <= 1 {
        return 1.0;
    }
    1.0 - 0.5 * (rank as f32 / (count - 1) as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_score_bounds() {
        assert_eq!(rank_score(0, 1), 1.0);
        assert_eq!(rank_score(0, 5), 1.0);
        assert_eq!(rank_score(4, 5), 0.5);
        assert!(rank_score(2, 5) < 1.0 && rank_score(2, 5) > 0.5);
    }

    #[test]
    fn test_blank_query_is_rejected() {
        assert!(matches!(require_query("  "), Err(ProviderError::InvalidQuery(_))));
        assert_eq!(require_query(" rust ").unwrap(), "rust");
    }
}
