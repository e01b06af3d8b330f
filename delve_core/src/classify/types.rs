use serde::{Deserialize, Serialize};

/// How much effort the caller should spend on a query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Quick,
    #[default]
    Standard,
    Deep,
}

impl std::fmt::Display for SearchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SearchMode::Quick => "quick",
            SearchMode::Standard => "standard",
            SearchMode::Deep => "deep",
        })
    }
}

/// Which stage produced a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationSource {
    Pattern,
    Model,
    Default,
    Forced,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryClassification {
    pub backend: String,
    pub confidence: f32,
    pub reason: String,
    pub mode: SearchMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_hint: Option<String>,
    pub source: ClassificationSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
}

impl QueryClassification {
    /// Classification for an explicitly requested backend.
    pub fn forced(backend: &str) -> Self {
        Self {
            backend: backend.to_string(),
            confidence: 1.0,
            reason: format!("Backend '{backend}' requested explicitly"),
            mode: SearchMode::Standard,
            domain_hint: None,
            source: ClassificationSource::Forced,
            rule_id: None,
        }
    }
}

/// One row of the rule table.
///
/// A rule matches when any keyword or pattern matches, every `all_keywords`
/// entry is present and no `exclude` keyword is present. Rules with only
/// `all_keywords` match on those alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRule {
    pub id: String,
    pub backend: String,
    pub priority: i32,
    pub confidence: f32,
    pub reason: String,
    #[serde(default)]
    pub mode: SearchMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patterns: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub all_keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

/// Lowercase and trim. The only normalization applied before matching and
/// memoization.
pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}
