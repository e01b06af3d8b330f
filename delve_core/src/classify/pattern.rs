use super::rules::RuleTable;
use super::types::{normalize_query, ClassificationSource, QueryClassification, SearchMode};
use tracing::debug;

/// Confidence reported when no rule matches.
pub const FALLBACK_CONFIDENCE: f32 = 0.3;

/// Deterministic, I/O-free classification from the rule table.
#[derive(Debug, Clone)]
pub struct PatternClassifier {
    table: RuleTable,
    default_backend: String,
}

impl PatternClassifier {
    pub fn new(table: RuleTable, default_backend: impl Into<String>) -> Self {
        Self {
            table,
            default_backend: default_backend.into(),
        }
    }

    pub fn table(&self) -> &RuleTable {
        &self.table
    }

    pub fn default_backend(&self) -> &str {
        &self.default_backend
    }

    /// Classify `query`. Never fails: no match yields the default backend
    /// with [`FALLBACK_CONFIDENCE`].
    pub fn classify(&self, query: &str) -> QueryClassification {
        let normalized = normalize_query(query);
        match self.table.first_match(&normalized) {
            Some(rule) => {
                debug!(target: "delve.classify", rule = %rule.id, backend = %rule.backend, "rule matched");
                QueryClassification {
                    backend: rule.backend.clone(),
                    confidence: rule.confidence,
                    reason: rule.reason.clone(),
                    mode: rule.mode,
                    domain_hint: rule.domain.clone(),
                    source: ClassificationSource::Pattern,
                    rule_id: Some(rule.id.clone()),
                }
            }
            None => QueryClassification {
                backend: self.default_backend.clone(),
                confidence: FALLBACK_CONFIDENCE,
                reason: "No specific pattern matched; using general search".to_string(),
                mode: SearchMode::Standard,
                domain_hint: None,
                source: ClassificationSource::Default,
                rule_id: None,
            },
        }
    }
}
