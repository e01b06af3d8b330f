//! Wikipedia full-text search through the MediaWiki action API.

use super::http::{self, rank_score};
use super::{Provider, ProviderResults, Source};
use crate::error::ProviderError;
use crate::utils::clean_text;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

pub struct WikipediaProvider {
    client: Client,
    language: String,
}

impl WikipediaProvider {
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_language("en")
    }

    pub fn with_language(language: &str) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http::client()?,
            language: language.to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("https://{}.wikipedia.org/w/api.php", self.language)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    query: Option<QueryBlock>,
}

#[derive(Debug, Deserialize)]
struct QueryBlock {
    #[serde(default)]
    searchinfo: Option<SearchInfo>,
    #[serde(default)]
    search: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct SearchInfo {
    #[serde(default)]
    totalhits: usize,
}

#[derive(Debug, Deserialize)]
struct Hit {
    title: String,
    #[serde(default)]
    snippet: String,
}

fn article_url(language: &str, title: &str) -> String {
    format!(
        "https://{language}.wikipedia.org/wiki/{}",
        urlencoding::encode(&title.replace(' ', "_"))
    )
}

fn into_results(resp: SearchResponse, language: &str) -> ProviderResults {
    let Some(block) = resp.query else {
        return ProviderResults::empty();
    };
    let n = block.search.len();
    let total = block.searchinfo.map(|i| i.totalhits).unwrap_or(n);
    let sources = block
        .search
        .into_iter()
        .enumerate()
        .map(|(rank, hit)| {
            Source::new(article_url(language, &hit.title), hit.title)
                .with_content(clean_text(&hit.snippet))
                .with_quality(0.9 * rank_score(rank, n))
        })
        .collect();
    ProviderResults::new(sources, total)
}

#[async_trait]
impl Provider for WikipediaProvider {
    fn id(&self) -> &'static str {
        "wikipedia"
    }

    fn description(&self) -> &'static str {
        "Wikipedia full-text article search"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<ProviderResults, ProviderError> {
        let q = http::require_query(query)?;
        let limit = limit.clamp(1, 50).to_string();
        let req = self.client.get(self.endpoint()).query(&[
            ("action", "query"),
            ("list", "search"),
            ("format", "json"),
            ("utf8", "1"),
            ("srsearch", q),
            ("srlimit", limit.as_str()),
        ]);
        let resp: SearchResponse = http::get_json(self.id(), req).await?;
        Ok(into_results(resp, &self.language))
    }
}
