//! The Metropolitan Museum of Art collection API.
//!
//! Search returns only object ids; details come from one request per object,
//! issued concurrently.

use super::http::{self, rank_score};
use super::{Provider, ProviderResults, Source};
use crate::error::ProviderError;
use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

const BASE: &str = "https://collectionapi.metmuseum.org/public/collection/v1";

pub struct MetMuseumProvider {
    client: Client,
}

impl MetMuseumProvider {
    pub fn new() -> Result<Self, ProviderError> {
        Ok(Self {
            client: http::client()?,
        })
    }

    async fn object(&self, id: u64) -> Result<MetObject, ProviderError> {
        let req = self.client.get(format!("{BASE}/objects/{id}"));
        http::get_json(self.id(), req).await
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    total: usize,
    /// `null` when nothing matches
    #[serde(default, rename = "objectIDs")]
    object_ids: Option<Vec<u64>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetObject {
    #[serde(rename = "objectID")]
    object_id: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    artist_display_name: String,
    #[serde(default)]
    object_date: String,
    #[serde(default)]
    medium: String,
    #[serde(default)]
    department: String,
    #[serde(default, rename = "objectURL")]
    object_url: String,
    #[serde(default)]
    is_highlight: bool,
}

fn to_source(obj: MetObject, rank: usize, count: usize) -> Option<Source> {
    if obj.title.is_empty() {
        return None;
    }
    let url = if obj.object_url.is_empty() {
        format!("https://www.metmuseum.org/art/collection/search/{}", obj.object_id)
    } else {
        obj.object_url
    };
    let details: Vec<&str> = [
        obj.artist_display_name.as_str(),
        obj.object_date.as_str(),
        obj.medium.as_str(),
        obj.department.as_str(),
    ]
    .into_iter()
    .filter(|s| !s.is_empty())
    .collect();
    let mut score = 0.8 * rank_score(rank, count);
    if obj.is_highlight {
        score = (score + 0.15).min(1.0);
    }
    Some(
        Source::new(url, obj.title.clone())
            .with_content(details.join(" · "))
            .with_quality(score),
    )
}

#[async_trait]
impl Provider for MetMuseumProvider {
    fn id(&self) -> &'static str {
        "met_museum"
    }

    fn description(&self) -> &'static str {
        "The Metropolitan Museum of Art collection"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<ProviderResults, ProviderError> {
        let q = http::require_query(query)?;
        let req = self
            .client
            .get(format!("{BASE}/search"))
            .query(&[("q", q), ("hasImages", "true")]);
        let resp: SearchResponse = http::get_json(self.id(), req).await?;
        let ids: Vec<u64> = resp
            .object_ids
            .unwrap_or_default()
            .into_iter()
            .take(limit.clamp(1, 20))
            .collect();
        if ids.is_empty() {
            return Ok(ProviderResults::new(Vec::new(), resp.total));
        }

        let count = ids.len();
        let fetched = join_all(ids.iter().map(|&id| self.object(id))).await;
        let mut sources = Vec::with_capacity(count);
        let mut last_err = None;
        for (rank, outcome) in fetched.into_iter().enumerate() {
            match outcome {
                Ok(obj) => sources.extend(to_source(obj, rank, count)),
                Err(e) => {
                    debug!(target: "delve.dispatch", backend = "met_museum", error = %e, "object fetch failed");
                    last_err = Some(e);
                }
            }
        }
        // Only fail when every detail lookup failed
        match last_err {
            Some(e) if sources.is_empty() => Err(e),
            _ => Ok(ProviderResults::new(sources, resp.total)),
        }
    }
}
