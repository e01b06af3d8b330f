//! GitHub repository search.

use super::http;
use super::{Credentials, Provider, ProviderResults, Source};
use crate::error::ProviderError;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde::Deserialize;

const ENDPOINT: &str = "https://api.github.com/search/repositories";

pub struct GitHubProvider {
    client: Client,
    token: Option<String>,
}

impl GitHubProvider {
    /// A token raises rate limits; anonymous search works without one.
    pub fn new(credentials: &Credentials) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http::client()?,
            token: credentials.get("GITHUB_TOKEN").map(str::to_string),
        })
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    total_count: usize,
    #[serde(default)]
    items: Vec<Repo>,
}

#[derive(Debug, Deserialize)]
struct Repo {
    full_name: String,
    html_url: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    topics: Vec<String>,
    #[serde(default)]
    archived: bool,
}

fn into_results(resp: SearchResponse) -> ProviderResults {
    let sources = resp
        .items
        .into_iter()
        .map(|repo| {
            let mut meta = vec![format!("★ {}", repo.stargazers_count)];
            if let Some(lang) = repo.language.as_deref() {
                meta.push(lang.to_string());
            }
            if repo.archived {
                meta.push("archived".to_string());
            }
            if !repo.topics.is_empty() {
                meta.push(repo.topics.iter().take(5).cloned().collect::<Vec<_>>().join(", "));
            }
            let description = repo.description.unwrap_or_default();
            let content = if description.is_empty() {
                meta.join(" · ")
            } else {
                format!("{description} ({})", meta.join(" · "))
            };
            let mut score = 0.4 + 0.6 * ((repo.stargazers_count as f64 + 1.0).log10() / 5.0).min(1.0) as f32;
            if repo.archived {
                score *= 0.7;
            }
            Source::new(repo.html_url, repo.full_name)
                .with_content(content)
                .with_quality(score)
        })
        .collect();
    ProviderResults::new(sources, resp.total_count)
}

#[async_trait]
impl Provider for GitHubProvider {
    fn id(&self) -> &'static str {
        "github"
    }

    fn description(&self) -> &'static str {
        "GitHub repository search"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<ProviderResults, ProviderError> {
        let q = http::require_query(query)?;
        let per_page = limit.clamp(1, 100).to_string();
        let mut req = self
            .client
            .get(ENDPOINT)
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .query(&[("q", q), ("per_page", per_page.as_str())]);
        if let Some(token) = &self.token {
            req = req.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let resp: SearchResponse = http::get_json(self.id(), req).await?;
        Ok(into_results(resp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maps_repositories() {
        let json = r#"{"total_count": 2, "incomplete_results": false, "items": [
            {"full_name": "tokio-rs/tokio", "html_url": "https://github.com/tokio-rs/tokio",
             "description": "A runtime for async Rust", "stargazers_count": 99999,
             "language": "Rust", "topics": ["async", "runtime"]},
            {"full_name": "someone/old", "html_url": "https://github.com/someone/old",
             "description": null, "stargazers_count": 0, "archived": true}
        ]}"#;
        let results = into_results(serde_json::from_str(json).unwrap());
        assert_eq!(results.total, 2);
        assert_eq!(results.sources[0].title, "tokio-rs/tokio");
        assert_eq!(
            results.sources[0].content,
            "A runtime for async Rust (★ 99999 · Rust · async, runtime)"
        );
        assert_eq!(results.sources[1].content, "★ 0 · archived");
        assert!(results.sources[1].quality_score < 0.4);
    }
}
