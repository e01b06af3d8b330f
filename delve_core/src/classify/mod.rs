//! Query classification.
//!
//! [`PatternClassifier`] answers every query from the rule table. When its
//! confidence is low the engine may ask a [`ModelClassifier`] instead.

mod model;
mod pattern;
mod rules;
mod types;

pub use model::{AnthropicModel, LanguageModel, ModelClassifier};
pub use pattern::{PatternClassifier, FALLBACK_CONFIDENCE};
pub use rules::RuleTable;
pub use types::{
    normalize_query, ClassificationRule, ClassificationSource, QueryClassification, SearchMode,
};
