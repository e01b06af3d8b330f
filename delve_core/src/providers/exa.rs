//! Exa neural web search. Needs `EXA_API_KEY`.

use super::http;
use super::{Credentials, Provider, ProviderResults, Source};
use crate::error::ProviderError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

const ENDPOINT: &str = "https://api.exa.ai/search";

pub struct ExaProvider {
    client: Client,
    api_key: Option<String>,
}

impl ExaProvider {
    pub fn new(credentials: &Credentials) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http::client()?,
            api_key: credentials.get("EXA_API_KEY").map(str::to_string),
        })
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Hit {
    url: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    published_date: Option<String>,
    #[serde(default)]
    score: Option<f32>,
}

fn into_results(resp: SearchResponse) -> ProviderResults {
    let total = resp.results.len();
    let sources = resp
        .results
        .into_iter()
        .map(|hit| {
            let title = hit.title.filter(|t| !t.is_empty()).unwrap_or_else(|| hit.url.clone());
            let mut content = hit.text.unwrap_or_default();
            if let Some(date) = hit.published_date.as_deref().and_then(|d| d.get(..10)) {
                content = format!("Published {date}. {content}");
            }
            Source::new(hit.url, title)
                .with_content(content)
                .with_quality(hit.score.unwrap_or(0.5))
                .with_summary(hit.summary.unwrap_or_default())
        })
        .collect();
    ProviderResults::new(sources, total)
}

#[async_trait]
impl Provider for ExaProvider {
    fn id(&self) -> &'static str {
        "exa"
    }

    fn description(&self) -> &'static str {
        "Exa neural web search"
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn search(&self, query: &str, limit: usize) -> Result<ProviderResults, ProviderError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or(ProviderError::MissingCredential("EXA_API_KEY"))?;
        let q = http::require_query(query)?;
        let body = json!({
            "query": q,
            "numResults": limit.clamp(1, 25),
            "contents": { "text": { "maxCharacters": 800 } },
        });
        let req = self
            .client
            .post(ENDPOINT)
            .header("x-api-key", key)
            .json(&body);
        let resp: SearchResponse = http::get_json(self.id(), req).await?;
        Ok(into_results(resp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maps_results() {
        let json = r#"{"requestId": "r", "results": [
            {"url": "https://blog.example/raft", "title": "Understanding Raft",
             "text": "Consensus made simple", "publishedDate": "2023-04-01T00:00:00.000Z", "score": 0.42},
            {"url": "https://untitled.example", "title": null}
        ]}"#;
        let results = into_results(serde_json::from_str(json).unwrap());
        assert_eq!(results.sources[0].content, "Published 2023-04-01. Consensus made simple");
        assert_eq!(results.sources[0].quality_score, 0.42);
        assert_eq!(results.sources[1].title, "https://untitled.example");
    }
}
