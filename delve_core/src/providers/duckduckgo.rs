//! DuckDuckGo Instant Answer API. Credential-free; the terminal fallback.

use super::http::{self, rank_score};
use super::{Provider, ProviderResults, Source};
use crate::error::ProviderError;
use crate::utils::clean_text;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

const ENDPOINT: &str = "https://api.duckduckgo.com/";

pub struct DuckDuckGoProvider {
    client: Client,
}

impl DuckDuckGoProvider {
    pub fn new() -> Result<Self, ProviderError> {
        Ok(Self {
            client: http::client()?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstantAnswer {
    #[serde(default)]
    heading: String,
    #[serde(default)]
    abstract_text: String,
    #[serde(default, rename = "AbstractURL")]
    abstract_url: String,
    #[serde(default)]
    answer: String,
    #[serde(default)]
    definition: String,
    #[serde(default, rename = "DefinitionURL")]
    definition_url: String,
    #[serde(default)]
    related_topics: Vec<Topic>,
    #[serde(default)]
    results: Vec<Topic>,
}

/// Either a single topic or a named group of topics.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Topic {
    Item {
        #[serde(rename = "FirstURL")]
        first_url: String,
        #[serde(rename = "Text", default)]
        text: String,
    },
    Group {
        #[serde(rename = "Topics", default)]
        topics: Vec<Topic>,
    },
}

fn flatten<'a>(topics: &'a [Topic], out: &mut Vec<(&'a str, &'a str)>) {
    for topic in topics {
        match topic {
            Topic::Item { first_url, text } => out.push((first_url, text)),
            Topic::Group { topics } => flatten(topics, out),
        }
    }
}

fn into_results(resp: InstantAnswer, limit: usize) -> ProviderResults {
    let mut sources = Vec::new();

    if !resp.abstract_url.is_empty() && !resp.abstract_text.is_empty() {
        let title = if resp.heading.is_empty() {
            resp.abstract_url.clone()
        } else {
            resp.heading.clone()
        };
        sources.push(
            Source::new(&resp.abstract_url, title)
                .with_content(clean_text(&resp.abstract_text))
                .with_quality(0.9),
        );
    }
    if !resp.definition_url.is_empty() && !resp.definition.is_empty() {
        sources.push(
            Source::new(&resp.definition_url, format!("Definition: {}", resp.heading))
                .with_content(clean_text(&resp.definition))
                .with_quality(0.85),
        );
    }

    let mut topics = Vec::new();
    flatten(&resp.results, &mut topics);
    flatten(&resp.related_topics, &mut topics);
    let total = sources.len() + topics.len();
    let n = topics.len();
    for (rank, (url, text)) in topics.into_iter().enumerate() {
        if url.is_empty() {
            continue;
        }
        let text = clean_text(text);
        // Topic text reads "Title - description"
        let title = text.split(" - ").next().unwrap_or(&text).to_string();
        sources.push(
            Source::new(url, title)
                .with_content(text.clone())
                .with_quality(0.75 * rank_score(rank, n)),
        );
    }
    sources.truncate(limit);

    let answer = if !resp.answer.is_empty() {
        Some(clean_text(&resp.answer))
    } else if !resp.abstract_text.is_empty() {
        Some(clean_text(&resp.abstract_text))
    } else {
        None
    };
    ProviderResults::new(sources, total).with_answer(answer)
}

#[async_trait]
impl Provider for DuckDuckGoProvider {
    fn id(&self) -> &'static str {
        "duckduckgo"
    }

    fn description(&self) -> &'static str {
        "DuckDuckGo instant answers and related topics"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<ProviderResults, ProviderError> {
        let q = http::require_query(query)?;
        let req = self.client.get(ENDPOINT).query(&[
            ("q", q),
            ("format", "json"),
            ("no_html", "1"),
            ("skip_disambig", "1"),
            ("no_redirect", "1"),
        ]);
        // The API answers with an empty body for some queries
        let body = http::send(self.id(), req).await?.text().await?;
        if body.trim().is_empty() {
            return Ok(ProviderResults::empty());
        }
        let resp: InstantAnswer = serde_json::from_str(&body)?;
        Ok(into_results(resp, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abstract_and_nested_topics() {
        let json = r#"{
            "Heading": "Rust (programming language)",
            "AbstractText": "Rust is a <b>general-purpose</b> language.",
            "AbstractURL": "https://en.wikipedia.org/wiki/Rust_(programming_language)",
            "Answer": "",
            "RelatedTopics": [
                {"FirstURL": "https://duckduckgo.com/Cargo", "Text": "Cargo - Rust package manager"},
                {"Name": "See also", "Topics": [
                    {"FirstURL": "https://duckduckgo.com/Ferris", "Text": "Ferris - the crab"}
                ]}
            ]
        }"#;
        let resp: InstantAnswer = serde_json::from_str(json).unwrap();
        let results = into_results(resp, 10);
        assert_eq!(results.sources.len(), 3);
        assert_eq!(results.sources[0].title, "Rust (programming language)");
        assert_eq!(results.sources[0].content, "Rust is a general-purpose language.");
        assert_eq!(results.sources[1].title, "Cargo");
        assert_eq!(results.sources[2].url, "https://duckduckgo.com/Ferris");
        assert_eq!(results.answer.as_deref(), Some("Rust is a general-purpose language."));
    }

    #[test]
    fn test_empty_answer_is_empty_result() {
        let resp: InstantAnswer = serde_json::from_str(r#"{"RelatedTopics": []}"#).unwrap();
        let results = into_results(resp, 5);
        assert!(results.is_empty());
        assert!(results.answer.is_none());
    }

    #[test]
    fn test_instant_answer_wins() {
        let resp: InstantAnswer =
            serde_json::from_str(r#"{"Answer": "42", "AbstractText": "ignored"}"#).unwrap();
        assert_eq!(into_results(resp, 5).answer.as_deref(), Some("42"));
    }
}
