//! Semantic Scholar Graph API paper search.

use super::http;
use super::{Credentials, Provider, ProviderResults, Source};
use crate::error::ProviderError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

const ENDPOINT: &str = "https://api.semanticscholar.org/graph/v1/paper/search";
const FIELDS: &str = "title,abstract,url,year,venue,citationCount,authors,tldr,externalIds";

pub struct SemanticScholarProvider {
    client: Client,
    api_key: Option<String>,
}

impl SemanticScholarProvider {
    /// An API key raises rate limits but is not required.
    pub fn new(credentials: &Credentials) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http::client()?,
            api_key: credentials.get("SEMANTIC_SCHOLAR_API_KEY").map(str::to_string),
        })
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    total: usize,
    #[serde(default)]
    data: Vec<Paper>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Paper {
    paper_id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(rename = "abstract", default)]
    abstract_text: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    year: Option<u32>,
    #[serde(default)]
    venue: Option<String>,
    #[serde(default)]
    citation_count: Option<u64>,
    #[serde(default)]
    authors: Vec<Author>,
    #[serde(default)]
    tldr: Option<Tldr>,
}

#[derive(Debug, Deserialize)]
struct Author {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct Tldr {
    #[serde(default)]
    text: Option<String>,
}

/// Citation count mapped onto [0.5, 1.0] on a log scale.
fn citation_score(citations: u64) -> f32 {
    let scaled = ((citations as f64 + 1.0).log10() / 4.0).min(1.0) as f32;
    0.5 + 0.5 * scaled
}

fn byline(paper: &Paper) -> String {
    let mut parts = Vec::new();
    let names: Vec<&str> = paper.authors.iter().take(3).map(|a| a.name.as_str()).collect();
    if !names.is_empty() {
        let etal = if paper.authors.len() > 3 { " et al." } else { "" };
        parts.push(format!("{}{etal}", names.join(", ")));
    }
    if let Some(venue) = paper.venue.as_deref().filter(|v| !v.is_empty()) {
        parts.push(venue.to_string());
    }
    if let Some(year) = paper.year {
        parts.push(year.to_string());
    }
    parts.join(" · ")
}

fn into_results(resp: SearchResponse) -> ProviderResults {
    let sources = resp
        .data
        .into_iter()
        .filter_map(|paper| {
            let title = paper.title.clone().filter(|t| !t.is_empty())?;
            let url = paper
                .url
                .clone()
                .unwrap_or_else(|| format!("https://www.semanticscholar.org/paper/{}", paper.paper_id));
            let byline = byline(&paper);
            let body = paper.abstract_text.clone().unwrap_or_default();
            let content = match (byline.is_empty(), body.is_empty()) {
                (true, _) => body,
                (false, true) => byline,
                (false, false) => format!("{byline}. {body}"),
            };
            let summary = paper.tldr.and_then(|t| t.text).unwrap_or_default();
            Some(
                Source::new(url, title)
                    .with_content(content)
                    .with_quality(citation_score(paper.citation_count.unwrap_or(0)))
                    .with_summary(summary),
            )
        })
        .collect();
    ProviderResults::new(sources, resp.total)
}

#[async_trait]
impl Provider for SemanticScholarProvider {
    fn id(&self) -> &'static str {
        "semantic_scholar"
    }

    fn description(&self) -> &'static str {
        "Semantic Scholar academic paper search"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<ProviderResults, ProviderError> {
        let q = http::require_query(query)?;
        let limit = limit.clamp(1, 100).to_string();
        let mut req = self.client.get(ENDPOINT).query(&[
            ("query", q),
            ("limit", limit.as_str()),
            ("fields", FIELDS),
        ]);
        if let Some(key) = &self.api_key {
            req = req.header("x-api-key", key);
        }
        let resp: SearchResponse = http::get_json(self.id(), req).await?;
        Ok(into_results(resp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maps_papers() {
        let json = r#"{"total": 5120, "offset": 0, "data": [
            {"paperId": "204e3073", "title": "Attention is All you Need",
             "abstract": "The dominant sequence transduction models...",
             "url": "https://www.semanticscholar.org/paper/204e3073",
             "year": 2017, "venue": "NeurIPS", "citationCount": 100000,
             "authors": [{"name": "Ashish Vaswani"}, {"name": "Noam Shazeer"}, {"name": "Niki Parmar"}, {"name": "Jakob Uszkoreit"}],
             "tldr": {"model": "tldr@v2", "text": "A new architecture based on attention."}},
            {"paperId": "abc", "title": null},
            {"paperId": "def", "title": "Obscure note", "citationCount": 0}
        ]}"#;
        let results = into_results(serde_json::from_str(json).unwrap());
        assert_eq!(results.total, 5120);
        assert_eq!(results.sources.len(), 2);

        let top = &results.sources[0];
        assert_eq!(top.title, "Attention is All you Need");
        assert!(top.content.starts_with("Ashish Vaswani, Noam Shazeer, Niki Parmar et al. · NeurIPS · 2017."));
        assert_eq!(top.summary.as_deref(), Some("A new architecture based on attention."));
        assert_eq!(top.quality_score, 1.0);

        let obscure = &results.sources[1];
        assert_eq!(obscure.url, "https://www.semanticscholar.org/paper/def");
        assert_eq!(obscure.quality_score, 0.5);
    }
}
