//! Hacker News stories via the Algolia search API.

use super::http;
use super::{Provider, ProviderResults, Source};
use crate::error::ProviderError;
use crate::utils::clean_text;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

const ENDPOINT: &str = "https://hn.algolia.com/api/v1/search";

pub struct HackerNewsProvider {
    client: Client,
}

impl HackerNewsProvider {
    pub fn new() -> Result<Self, ProviderError> {
        Ok(Self {
            client: http::client()?,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    nb_hits: usize,
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "objectID")]
    object_id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    points: Option<u64>,
    #[serde(default)]
    num_comments: Option<u64>,
    #[serde(default)]
    story_text: Option<String>,
}

fn item_url(id: &str) -> String {
    format!("https://news.ycombinator.com/item?id={id}")
}

fn into_results(resp: SearchResponse) -> ProviderResults {
    let sources = resp
        .hits
        .into_iter()
        .filter_map(|hit| {
            let title = hit.title.filter(|t| !t.is_empty())?;
            let discussion = item_url(&hit.object_id);
            let url = hit.url.filter(|u| !u.is_empty()).unwrap_or_else(|| discussion.clone());
            let points = hit.points.unwrap_or(0);
            let mut content = format!(
                "{points} points, {} comments by {} ({discussion})",
                hit.num_comments.unwrap_or(0),
                hit.author.as_deref().unwrap_or("unknown"),
            );
            if let Some(text) = hit.story_text.filter(|t| !t.is_empty()) {
                content.push_str(". ");
                content.push_str(&clean_text(&text));
            }
            // 1000 points is about as good as it gets
            let score = 0.4 + 0.6 * (points as f32 / 1000.0).min(1.0);
            Some(Source::new(url, title).with_content(content).with_quality(score))
        })
        .collect();
    ProviderResults::new(sources, resp.nb_hits)
}

#[async_trait]
impl Provider for HackerNewsProvider {
    fn id(&self) -> &'static str {
        "hackernews"
    }

    fn description(&self) -> &'static str {
        "Hacker News stories and discussion"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<ProviderResults, ProviderError> {
        let q = http::require_query(query)?;
        let per_page = limit.clamp(1, 50).to_string();
        let req = self.client.get(ENDPOINT).query(&[
            ("query", q),
            ("tags", "story"),
            ("hitsPerPage", per_page.as_str()),
        ]);
        let resp: SearchResponse = http::get_json(self.id(), req).await?;
        Ok(into_results(resp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maps_hits() {
        let json = r#"{"nbHits": 300, "hits": [
            {"objectID": "1", "title": "Show HN: A tiny Rust database", "url": "https://example.com/db",
             "author": "pg", "points": 2000, "num_comments": 120},
            {"objectID": "2", "title": "Ask HN: Favourite crates?", "url": null,
             "author": "dang", "points": 10, "num_comments": 5, "story_text": "<p>Curious &amp; listening</p>"},
            {"objectID": "3", "title": null}
        ]}"#;
        let results = into_results(serde_json::from_str(json).unwrap());
        assert_eq!(results.total, 300);
        assert_eq!(results.sources.len(), 2);
        assert_eq!(results.sources[0].quality_score, 1.0);
        assert_eq!(results.sources[1].url, "https://news.ycombinator.com/item?id=2");
        assert!(results.sources[1].content.ends_with("Curious & listening"));
    }
}
