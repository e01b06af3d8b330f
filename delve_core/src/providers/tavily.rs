//! Tavily web search. Needs `TAVILY_API_KEY`.

use super::http;
use super::{Credentials, Provider, ProviderResults, Source};
use crate::error::ProviderError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

const ENDPOINT: &str = "https://api.tavily.com/search";

pub struct TavilyProvider {
    client: Client,
    api_key: Option<String>,
}

impl TavilyProvider {
    pub fn new(credentials: &Credentials) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http::client()?,
            api_key: credentials.get("TAVILY_API_KEY").map(str::to_string),
        })
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: Option<f32>,
}

fn into_results(resp: SearchResponse) -> ProviderResults {
    let total = resp.results.len();
    let sources = resp
        .results
        .into_iter()
        .map(|hit| {
            Source::new(hit.url, hit.title)
                .with_content(hit.content)
                .with_quality(hit.score.unwrap_or(0.5))
        })
        .collect();
    ProviderResults::new(sources, total).with_answer(resp.answer)
}

#[async_trait]
impl Provider for TavilyProvider {
    fn id(&self) -> &'static str {
        "tavily"
    }

    fn description(&self) -> &'static str {
        "Tavily web search with synthesized answers"
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn search(&self, query: &str, limit: usize) -> Result<ProviderResults, ProviderError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or(ProviderError::MissingCredential("TAVILY_API_KEY"))?;
        let q = http::require_query(query)?;
        let body = json!({
            "query": q,
            "topic": "general",
            "search_depth": "basic",
            "max_results": limit.clamp(1, 20),
            "include_answer": true,
        });
        let req = self.client.post(ENDPOINT).bearer_auth(key).json(&body);
        let resp: SearchResponse = http::get_json(self.id(), req).await?;
        Ok(into_results(resp))
    }
}
