//! US government open data from the catalog.data.gov CKAN API.

use super::http::{self, rank_score};
use super::{Provider, ProviderResults, Source};
use crate::error::ProviderError;
use crate::utils::clean_text;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

const ENDPOINT: &str = "https://catalog.data.gov/api/3/action/package_search";

pub struct DataGovProvider {
    client: Client,
}

impl DataGovProvider {
    pub fn new() -> Result<Self, ProviderError> {
        Ok(Self {
            client: http::client()?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct PackageSearch {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    result: Option<PackageResult>,
}

#[derive(Debug, Deserialize)]
struct PackageResult {
    #[serde(default)]
    count: usize,
    #[serde(default)]
    results: Vec<Package>,
}

#[derive(Debug, Deserialize)]
struct Package {
    name: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    organization: Option<Organization>,
    #[serde(default)]
    num_resources: usize,
}

#[derive(Debug, Deserialize)]
struct Organization {
    #[serde(default)]
    title: String,
}

fn into_results(resp: PackageSearch) -> Result<ProviderResults, ProviderError> {
    if !resp.success {
        return Err(ProviderError::Parse("datagov: package_search reported failure".to_string()));
    }
    let Some(result) = resp.result else {
        return Ok(ProviderResults::empty());
    };
    let n = result.results.len();
    let sources = result
        .results
        .into_iter()
        .enumerate()
        .map(|(rank, pkg)| {
            let publisher = pkg
                .organization
                .map(|o| o.title)
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "Unknown publisher".to_string());
            let notes = clean_text(pkg.notes.as_deref().unwrap_or(""));
            let content = format!("{publisher} · {} resources. {notes}", pkg.num_resources);
            Source::new(
                format!("https://catalog.data.gov/dataset/{}", pkg.name),
                pkg.title.unwrap_or_else(|| pkg.name.clone()),
            )
            .with_content(content.trim_end_matches(". ").to_string())
            .with_quality(0.85 * rank_score(rank, n))
        })
        .collect();
    Ok(ProviderResults::new(sources, result.count))
}

#[async_trait]
impl Provider for DataGovProvider {
    fn id(&self) -> &'static str {
        "datagov"
    }

    fn description(&self) -> &'static str {
        "US government open datasets"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<ProviderResults, ProviderError> {
        let q = http::require_query(query)?;
        let rows = limit.clamp(1, 100).to_string();
        let req = self
            .client
            .get(ENDPOINT)
            .query(&[("q", q), ("rows", rows.as_str())]);
        let resp: PackageSearch = http::get_json(self.id(), req).await?;
        into_results(resp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maps_packages() {
        let json = r#"{"success": true, "result": {"count": 1204, "results": [
            {"name": "census-housing-2020", "title": "Census Housing 2020",
             "notes": "<p>Housing units by county</p>", "num_resources": 3,
             "organization": {"title": "U.S. Census Bureau"}},
            {"name": "untitled-set", "num_resources": 0}
        ]}}"#;
        let results = into_results(serde_json::from_str(json).unwrap()).unwrap();
        assert_eq!(results.total, 1204);
        assert_eq!(results.sources[0].url, "https://catalog.data.gov/dataset/census-housing-2020");
        assert_eq!(
            results.sources[0].content,
            "U.S. Census Bureau · 3 resources. Housing units by county"
        );
        assert_eq!(results.sources[1].title, "untitled-set");
        assert_eq!(results.sources[1].content, "Unknown publisher · 0 resources");
    }

    #[test]
    fn test_failure_flag_is_an_error() {
        let resp: PackageSearch = serde_json::from_str(r#"{"success": false}"#).unwrap();
        assert!(matches!(into_results(resp), Err(ProviderError::Parse(_))));
    }
}
