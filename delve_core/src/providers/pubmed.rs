//! PubMed through NCBI E-utilities: `esearch` for ids, then `esummary`.

use super::http::{self, rank_score};
use super::{Credentials, Provider, ProviderResults, Source};
use crate::error::ProviderError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

const ESEARCH: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi";
const ESUMMARY: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esummary.fcgi";

pub struct PubMedProvider {
    client: Client,
    api_key: Option<String>,
}

impl PubMedProvider {
    pub fn new(credentials: &Credentials) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http::client()?,
            api_key: credentials.get("NCBI_API_KEY").map(str::to_string),
        })
    }

    fn with_key(&self, mut params: Vec<(&'static str, String)>) -> Vec<(&'static str, String)> {
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }
        params
    }
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    esearchresult: SearchResult,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    /// E-utilities reports the count as a string
    #[serde(default)]
    count: String,
    #[serde(default)]
    idlist: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Summary {
    #[serde(default)]
    title: String,
    #[serde(default)]
    fulljournalname: String,
    #[serde(default)]
    pubdate: String,
    #[serde(default)]
    authors: Vec<SummaryAuthor>,
}

#[derive(Debug, Deserialize)]
struct SummaryAuthor {
    #[serde(default)]
    name: String,
}

/// `esummary` keys each record by its PMID next to a `uids` list.
fn into_results(ids: &[String], total: usize, summary: &Value) -> ProviderResults {
    let result = summary.get("result");
    let sources = ids
        .iter()
        .enumerate()
        .filter_map(|(rank, id)| {
            let record = result?.get(id)?;
            let doc: Summary = serde_json::from_value(record.clone()).ok()?;
            if doc.title.is_empty() {
                return None;
            }
            let authors: Vec<&str> = doc.authors.iter().take(3).map(|a| a.name.as_str()).collect();
            let mut content = doc.fulljournalname.clone();
            if !doc.pubdate.is_empty() {
                content = format!("{content}, {}", doc.pubdate);
            }
            if !authors.is_empty() {
                content = format!("{content}. {}", authors.join(", "));
            }
            Some(
                Source::new(format!("https://pubmed.ncbi.nlm.nih.gov/{id}/"), doc.title.clone())
                    .with_content(content.trim_start_matches(", ").to_string())
                    .with_quality(0.9 * rank_score(rank, ids.len())),
            )
        })
        .collect();
    ProviderResults::new(sources, total)
}

#[async_trait]
impl Provider for PubMedProvider {
    fn id(&self) -> &'static str {
        "pubmed"
    }

    fn description(&self) -> &'static str {
        "PubMed biomedical literature"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<ProviderResults, ProviderError> {
        let q = http::require_query(query)?;
        let params = self.with_key(vec![
            ("db", "pubmed".to_string()),
            ("term", q.to_string()),
            ("retmode", "json".to_string()),
            ("retmax", limit.clamp(1, 100).to_string()),
            ("sort", "relevance".to_string()),
        ]);
        let search: SearchEnvelope =
            http::get_json(self.id(), self.client.get(ESEARCH).query(&params)).await?;
        let ids = search.esearchresult.idlist;
        let total = search.esearchresult.count.parse().unwrap_or(ids.len());
        if ids.is_empty() {
            return Ok(ProviderResults::new(Vec::new(), total));
        }

        let params = self.with_key(vec![
            ("db", "pubmed".to_string()),
            ("id", ids.join(",")),
            ("retmode", "json".to_string()),
        ]);
        let summary: Value =
            http::get_json(self.id(), self.client.get(ESUMMARY).query(&params)).await?;
        Ok(into_results(&ids, total, &summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_maps_summaries_in_search_order() {
        let ids = vec!["222".to_string(), "111".to_string(), "333".to_string()];
        let summary = json!({"result": {
            "uids": ["111", "222"],
            "111": {"title": "Second", "fulljournalname": "Lancet", "pubdate": "2020 Jan",
                     "authors": [{"name": "Smith J"}]},
            "222": {"title": "First", "fulljournalname": "BMJ", "pubdate": "2023",
                     "authors": [{"name": "Doe A"}, {"name": "Roe B"}]}
        }});
        let results = into_results(&ids, 3, &summary);
        assert_eq!(results.sources.len(), 2);
        assert_eq!(results.sources[0].title, "First");
        assert_eq!(results.sources[0].url, "https://pubmed.ncbi.nlm.nih.gov/222/");
        assert_eq!(results.sources[0].content, "BMJ, 2023. Doe A, Roe B");
        assert_eq!(results.sources[1].title, "Second");
    }

    #[test]
    fn test_search_envelope_parses_string_count() {
        let env: SearchEnvelope =
            serde_json::from_str(r#"{"esearchresult": {"count": "17", "idlist": ["1"]}}"#).unwrap();
        assert_eq!(env.esearchresult.count, "17");
        assert_eq!(env.esearchresult.idlist, vec!["1"]);
    }
}
