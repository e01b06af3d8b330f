//! Language-model classification for queries the rule table is unsure about.

use super::types::{normalize_query, ClassificationSource, QueryClassification, SearchMode};
use crate::error::ModelError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// A text-completion service.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, system: &str, prompt: &str) -> Result<String, ModelError>;
}

/// Anthropic Messages API.
pub struct AnthropicModel {
    client: Client,
    api_key: String,
    model: String,
}

impl AnthropicModel {
    pub const DEFAULT_MODEL: &'static str = "claude-3-5-haiku-latest";
    const ENDPOINT: &'static str = "https://api.anthropic.com/v1/messages";

    pub fn new(api_key: impl Into<String>, model: Option<String>) -> Result<Self, ModelError> {
        let client = Client::builder()
            .user_agent(concat!("delve/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(20))
            .build()
            .map_err(|e| ModelError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.unwrap_or_else(|| Self::DEFAULT_MODEL.to_string()),
        })
    }

    /// Reads `ANTHROPIC_API_KEY`.
    pub fn from_env(model: Option<String>) -> Result<Self, ModelError> {
        let key = std::env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ModelError::MissingCredential("ANTHROPIC_API_KEY"))?;
        Self::new(key, model)
    }

    fn headers(&self) -> Result<HeaderMap, ModelError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key).map_err(|e| ModelError::Transport(e.to_string()))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static("2023-06-01"));
        Ok(headers)
    }
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[async_trait]
impl LanguageModel for AnthropicModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, prompt: &str) -> Result<String, ModelError> {
        let body = json!({
            "model": self.model,
            "max_tokens": 256,
            "system": system,
            "messages": [ { "role": "user", "content": prompt } ],
        });
        let resp = self
            .client
            .post(Self::ENDPOINT)
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(ModelError::Status(resp.status().as_u16()));
        }
        let parsed: MessagesResponse = resp
            .json()
            .await
            .map_err(|e| ModelError::Malformed(e.to_string()))?;
        let text: String = parsed
            .content
            .into_iter()
            .filter(|b| b.kind == "text")
            .map(|b| b.text)
            .collect();
        Ok(text)
    }
}

#[derive(Debug, Deserialize)]
struct Verdict {
    #[serde(alias = "provider")]
    backend: String,
    confidence: f32,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    mode: Option<SearchMode>,
}

/// Classifies through a [`LanguageModel`], memoizing successful answers per
/// normalized query.
pub struct ModelClassifier {
    model: Arc<dyn LanguageModel>,
    /// (backend id, description) pairs offered to the model
    backends: Vec<(String, String)>,
    memo: Mutex<HashMap<String, QueryClassification>>,
}

impl ModelClassifier {
    pub fn new<I>(model: Arc<dyn LanguageModel>, backends: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self {
            model,
            backends: backends.into_iter().collect(),
            memo: Mutex::new(HashMap::new()),
        }
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub async fn classify(&self, query: &str) -> Result<QueryClassification, ModelError> {
        let key = normalize_query(query);
        let cached = self
            .memo
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
            .cloned();
        if let Some(hit) = cached {
            return Ok(hit);
        }

        let prompt = format!("Query: {key}");
        let text = self.model.complete(&self.instructions(), &prompt).await?;
        let classification = parse_verdict(&text, &self.backends)?;
        debug!(
            target: "delve.classify",
            model = self.model.name(),
            backend = %classification.backend,
            confidence = classification.confidence,
            "model classification"
        );

        self.memo
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, classification.clone());
        Ok(classification)
    }

    fn instructions(&self) -> String {
        let mut out = String::from(
            "You route search queries to the single best backend.\n\
             Reply with one JSON object and nothing else:\n\
             {\"backend\": \"<id>\", \"confidence\": <0.0-1.0>, \"reason\": \"<short>\", \
             \"mode\": \"quick|standard|deep\"}\n\nBackends:\n",
        );
        for (id, description) in &self.backends {
            out.push_str(&format!("- {id}: {description}\n"));
        }
        out
    }
}

/// Pull the JSON object out of a reply that may wrap it in prose or code
/// fences, and check the backend against `allowed`.
pub(crate) fn parse_verdict(
    text: &str,
    allowed: &[(String, String)],
) -> Result<QueryClassification, ModelError> {
    let start = text.find('{');
    let end = text.rfind('}');
    let json = match (start, end) {
        (Some(s), Some(e)) if s < e => &text[s..=e],
        _ => return Err(ModelError::Malformed("no JSON object in reply".to_string())),
    };
    let verdict: Verdict =
        serde_json::from_str(json).map_err(|e| ModelError::Malformed(e.to_string()))?;

    let wanted = verdict.backend.trim().to_lowercase();
    let Some((backend, _)) = allowed.iter().find(|(id, _)| id.to_lowercase() == wanted) else {
        return Err(ModelError::UnknownBackend(verdict.backend));
    };
    if !verdict.confidence.is_finite() {
        return Err(ModelError::Malformed("confidence is not a number".to_string()));
    }

    Ok(QueryClassification {
        backend: backend.clone(),
        confidence: verdict.confidence.clamp(0.0, 1.0),
        reason: if verdict.reason.trim().is_empty() {
            "Chosen by model".to_string()
        } else {
            verdict.reason.trim().to_string()
        },
        mode: verdict.mode.unwrap_or_default(),
        domain_hint: None,
        source: ClassificationSource::Model,
        rule_id: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CannedModel {
        reply: Result<String, ModelError>,
        calls: AtomicUsize,
    }

    impl CannedModel {
        fn new(reply: Result<&str, ModelError>) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.map(str::to_string),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl LanguageModel for CannedModel {
        fn name(&self) -> &str {
            "canned"
        }

        async fn complete(&self, _system: &str, _prompt: &str) -> Result<String, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone()
        }
    }

    fn backends() -> Vec<(String, String)> {
        vec![
            ("openalex".to_string(), "scholarly works".to_string()),
            ("duckduckgo".to_string(), "general".to_string()),
        ]
    }

    #[test]
    fn test_parse_plain_json() {
        let c = parse_verdict(
            r#"{"backend": "openalex", "confidence": 0.82, "reason": "scholarly", "mode": "deep"}"#,
            &backends(),
        )
        .unwrap();
        assert_eq!(c.backend, "openalex");
        assert_eq!(c.mode, SearchMode::Deep);
        assert_eq!(c.source, ClassificationSource::Model);
    }

    #[test]
    fn test_parse_fenced_and_prose() {
        let reply = "Sure! Here is my answer:\n```json\n{\"provider\": \"DuckDuckGo\", \"confidence\": 1.7}\n```\nHope that helps.";
        let c = parse_verdict(reply, &backends()).unwrap();
        assert_eq!(c.backend, "duckduckgo");
        assert_eq!(c.confidence, 1.0);
        assert_eq!(c.mode, SearchMode::Standard);
        assert!(!c.reason.is_empty());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_verdict("I think openalex", &backends()),
            Err(ModelError::Malformed(_))
        ));
        assert!(matches!(
            parse_verdict(r#"{"backend": "bing", "confidence": 0.9}"#, &backends()),
            Err(ModelError::UnknownBackend(b)) if b == "bing"
        ));
        assert!(matches!(
            parse_verdict(r#"{"confidence": 0.9}"#, &backends()),
            Err(ModelError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_successful_answers_are_memoized() {
        let model = CannedModel::new(Ok(r#"{"backend":"openalex","confidence":0.7}"#));
        let classifier = ModelClassifier::new(model.clone(), backends());

        let a = classifier.classify("Citation graph of Turing").await.unwrap();
        let b = classifier.classify("  citation graph of turing ").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failures_are_not_memoized() {
        let model = CannedModel::new(Err(ModelError::Status(503)));
        let classifier = ModelClassifier::new(model.clone(), backends());

        assert!(classifier.classify("q").await.is_err());
        assert!(classifier.classify("q").await.is_err());
        assert_eq!(model.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_instructions_list_backends() {
        let classifier = ModelClassifier::new(CannedModel::new(Ok("")), backends());
        let text = classifier.instructions();
        assert!(text.contains("- openalex: scholarly works"));
        assert!(text.contains("\"backend\""));
    }
}
