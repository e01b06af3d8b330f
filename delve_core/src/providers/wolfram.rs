//! Wolfram|Alpha Short Answers API. Needs `WOLFRAM_APP_ID`.

use super::http;
use super::{Credentials, Provider, ProviderResults, Source};
use crate::error::ProviderError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};

const ENDPOINT: &str = "https://api.wolframalpha.com/v1/result";

pub struct WolframProvider {
    client: Client,
    app_id: Option<String>,
}

impl WolframProvider {
    pub fn new(credentials: &Credentials) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http::client()?,
            app_id: credentials.get("WOLFRAM_APP_ID").map(str::to_string),
        })
    }
}

fn answer_results(query: &str, answer: &str) -> ProviderResults {
    let answer = answer.trim();
    if answer.is_empty() {
        return ProviderResults::empty();
    }
    let url = format!(
        "https://www.wolframalpha.com/input?i={}",
        urlencoding::encode(query)
    );
    let source = Source::new(url, format!("Wolfram|Alpha: {query}"))
        .with_content(answer)
        .with_quality(1.0);
    ProviderResults::new(vec![source], 1).with_answer(Some(answer.to_string()))
}

#[async_trait]
impl Provider for WolframProvider {
    fn id(&self) -> &'static str {
        "wolfram"
    }

    fn description(&self) -> &'static str {
        "Wolfram|Alpha computational answers"
    }

    fn is_available(&self) -> bool {
        self.app_id.is_some()
    }

    async fn search(&self, query: &str, _limit: usize) -> Result<ProviderResults, ProviderError> {
        let app_id = self
            .app_id
            .as_deref()
            .ok_or(ProviderError::MissingCredential("WOLFRAM_APP_ID"))?;
        let q = http::require_query(query)?;
        let resp = self
            .client
            .get(ENDPOINT)
            .query(&[("appid", app_id), ("i", q), ("units", "metric")])
            .send()
            .await?;
        // 501: the input was understood but has no short answer
        if resp.status() == StatusCode::NOT_IMPLEMENTED {
            return Ok(ProviderResults::empty());
        }
        if !resp.status().is_success() {
            return Err(ProviderError::from_status(self.id(), resp.status()));
        }
        let text = resp.text().await?;
        Ok(answer_results(q, &text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_becomes_source_and_answer() {
        let results = answer_results("15 * 42", "630\n");
        assert_eq!(results.answer.as_deref(), Some("630"));
        assert_eq!(results.sources.len(), 1);
        assert_eq!(results.sources[0].url, "https://www.wolframalpha.com/input?i=15%20%2A%2042");
    }

    #[test]
    fn test_blank_answer_is_empty() {
        assert!(answer_results("x", "  ").is_empty());
    }

    #[test]
    fn test_unavailable_without_app_id() {
        let provider = WolframProvider::new(&Credentials::default()).unwrap();
        assert!(!provider.is_available());
        let provider =
            WolframProvider::new(&Credentials::default().with("WOLFRAM_APP_ID", "ABC")).unwrap();
        assert!(provider.is_available());
    }
}
