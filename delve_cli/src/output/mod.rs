use crate::cli::OutputFormat;
use crate::commands::Result;
use delve_core::{
    BackendCategory, CacheStats, CircuitState, ClassificationRule, QueryClassification,
    UnifiedSearchResult,
};
use serde::Serialize;

mod pretty;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum OutputData {
    SearchResult(UnifiedSearchResult),
    MultiResults {
        query: String,
        results: Vec<UnifiedSearchResult>,
    },
    Classification {
        query: String,
        classification: QueryClassification,
        /// Backends that would be tried after the chosen one
        chain: Vec<String>,
    },
    Status(StatusReport),
    Rules(Vec<ClassificationRule>),
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub backends: Vec<BackendStatus>,
    pub cache: CacheStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackendStatus {
    pub id: String,
    pub category: BackendCategory,
    pub available: bool,
    pub fallback_eligible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circuit: Option<CircuitState>,
    pub fallbacks: Vec<String>,
}

pub fn format_output(data: &OutputData, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(data)?);
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yaml::to_string(data)?);
        }
        OutputFormat::Pretty => {
            println!("{}", render_pretty(data));
        }
    }
    Ok(())
}

fn render_pretty(data: &OutputData) -> String {
    match data {
        OutputData::SearchResult(result) => pretty::search_result(result),
        OutputData::MultiResults { query, results } => pretty::multi_results(query, results),
        OutputData::Classification {
            query,
            classification,
            chain,
        } => pretty::classification(query, classification, chain),
        OutputData::Status(report) => pretty::status(report),
        OutputData::Rules(rules) => pretty::rules(rules),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use delve_core::ClassificationSource;

    #[test]
    fn test_json_shape_is_tagged() {
        let data = OutputData::Classification {
            query: "q".to_string(),
            classification: QueryClassification::forced("wikipedia"),
            chain: vec!["tavily".into(), "duckduckgo".into()],
        };
        let value = serde_json::to_value(&data).unwrap();
        assert_eq!(value["type"], "Classification");
        assert_eq!(value["data"]["classification"]["backend"], "wikipedia");
        assert_eq!(value["data"]["chain"][1], "duckduckgo");

        let source = serde_json::to_value(ClassificationSource::Forced).unwrap();
        assert_eq!(value["data"]["classification"]["source"], source);
    }
}
