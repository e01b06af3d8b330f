//! OpenAlex works search. Broad scholarly coverage, no key.

use super::http;
use super::{Provider, ProviderResults, Source};
use crate::error::ProviderError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;

const ENDPOINT: &str = "https://api.openalex.org/works";

pub struct OpenAlexProvider {
    client: Client,
}

impl OpenAlexProvider {
    pub fn new() -> Result<Self, ProviderError> {
        Ok(Self {
            client: http::client()?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct WorksResponse {
    #[serde(default)]
    meta: Option<Meta>,
    #[serde(default)]
    results: Vec<Work>,
}

#[derive(Debug, Deserialize)]
struct Meta {
    #[serde(default)]
    count: usize,
}

#[derive(Debug, Deserialize)]
struct Work {
    id: String,
    #[serde(default)]
    doi: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    publication_year: Option<u32>,
    #[serde(default)]
    cited_by_count: u64,
    #[serde(default)]
    abstract_inverted_index: Option<HashMap<String, Vec<usize>>>,
    #[serde(default)]
    primary_location: Option<Location>,
}

#[derive(Debug, Deserialize)]
struct Location {
    #[serde(default)]
    landing_page_url: Option<String>,
    #[serde(default)]
    source: Option<Venue>,
}

#[derive(Debug, Deserialize)]
struct Venue {
    #[serde(default)]
    display_name: Option<String>,
}

/// OpenAlex ships abstracts as word -> positions; put the words back in order.
fn rebuild_abstract(index: &HashMap<String, Vec<usize>>) -> String {
    let mut words: Vec<(usize, &str)> = index
        .iter()
        .flat_map(|(word, positions)| positions.iter().map(move |&p| (p, word.as_str())))
        .collect();
    words.sort_unstable_by_key(|&(p, _)| p);
    words
        .into_iter()
        .map(|(_, w)| w)
        .collect::<Vec<_>>()
        .join(" ")
}

fn into_results(resp: WorksResponse) -> ProviderResults {
    let n = resp.results.len();
    let total = resp.meta.map(|m| m.count).unwrap_or(n);
    let sources = resp
        .results
        .into_iter()
        .filter_map(|work| {
            let title = work.display_name.filter(|t| !t.is_empty())?;
            let landing = work
                .primary_location
                .as_ref()
                .and_then(|l| l.landing_page_url.clone());
            let url = work.doi.or(landing).unwrap_or(work.id);

            let mut content = String::new();
            if let Some(venue) = work
                .primary_location
                .and_then(|l| l.source)
                .and_then(|s| s.display_name)
            {
                content.push_str(&venue);
            }
            if let Some(year) = work.publication_year {
                if !content.is_empty() {
                    content.push_str(" · ");
                }
                content.push_str(&year.to_string());
            }
            if let Some(index) = work.abstract_inverted_index.as_ref().filter(|i| !i.is_empty()) {
                if !content.is_empty() {
                    content.push_str(". ");
                }
                content.push_str(&rebuild_abstract(index));
            }

            let score = 0.5 + 0.5 * ((work.cited_by_count as f64 + 1.0).log10() / 4.0).min(1.0) as f32;
            Some(Source::new(url, title).with_content(content).with_quality(score))
        })
        .collect();
    ProviderResults::new(sources, total)
}

#[async_trait]
impl Provider for OpenAlexProvider {
    fn id(&self) -> &'static str {
        "openalex"
    }

    fn description(&self) -> &'static str {
        "OpenAlex scholarly works across all disciplines"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<ProviderResults, ProviderError> {
        let q = http::require_query(query)?;
        let per_page = limit.clamp(1, 50).to_string();
        let req = self
            .client
            .get(ENDPOINT)
            .query(&[("search", q), ("per-page", per_page.as_str())]);
        let resp: WorksResponse = http::get_json(self.id(), req).await?;
        Ok(into_results(resp))
    }
}
