//! Rule table: loading, validation and compiled matchers.

use super::types::ClassificationRule;
use crate::error::ConfigError;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

const BUILTIN_RULES: &str = include_str!("../../data/rules.yaml");

/// A keyword compiled for matching against a normalized query.
#[derive(Debug, Clone)]
enum Matcher {
    /// Single token, matched on word boundaries
    Word(Arc<Regex>),
    /// Multi-word phrase, matched as a substring
    Phrase(String),
}

impl Matcher {
    fn matches(&self, query: &str) -> bool {
        match self {
            Matcher::Word(re) => re.is_match(query),
            Matcher::Phrase(phrase) => query.contains(phrase.as_str()),
        }
    }
}

/// Compiles keywords, reusing the regex for a token seen before.
#[derive(Default)]
struct KeywordCompiler {
    memo: HashMap<String, Arc<Regex>>,
}

impl KeywordCompiler {
    fn compile(&mut self, rule: &str, keyword: &str) -> Result<Matcher, ConfigError> {
        let keyword = keyword.trim().to_lowercase();
        if keyword.contains(char::is_whitespace) {
            return Ok(Matcher::Phrase(keyword));
        }
        if let Some(re) = self.memo.get(&keyword) {
            return Ok(Matcher::Word(Arc::clone(re)));
        }
        // `\b` misbehaves next to non-word characters ("c++"), so anchor on
        // start/end or any non-word character instead.
        let re = Regex::new(&format!(r"(?:^|\W){}(?:$|\W)", regex::escape(&keyword)))
            .map_err(|source| ConfigError::Pattern {
                rule: rule.to_string(),
                source,
            })?;
        let re = Arc::new(re);
        self.memo.insert(keyword, Arc::clone(&re));
        Ok(Matcher::Word(re))
    }

    fn compile_all(&mut self, rule: &str, keywords: &[String]) -> Result<Vec<Matcher>, ConfigError> {
        keywords.iter().map(|k| self.compile(rule, k)).collect()
    }
}

#[derive(Debug, Clone)]
struct CompiledRule {
    rule: ClassificationRule,
    any: Vec<Matcher>,
    patterns: Vec<Regex>,
    all: Vec<Matcher>,
    exclude: Vec<Matcher>,
}

impl CompiledRule {
    fn matches(&self, query: &str) -> bool {
        let triggered = if self.any.is_empty() && self.patterns.is_empty() {
            !self.all.is_empty()
        } else {
            self.any.iter().any(|m| m.matches(query))
                || self.patterns.iter().any(|p| p.is_match(query))
        };
        triggered
            && self.all.iter().all(|m| m.matches(query))
            && !self.exclude.iter().any(|m| m.matches(query))
    }
}

/// Priority-ordered, precompiled rules.
#[derive(Debug, Clone)]
pub struct RuleTable {
    rules: Vec<CompiledRule>,
}

impl RuleTable {
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_yaml_str(BUILTIN_RULES)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let rules: Vec<ClassificationRule> = serde_yaml::from_str(yaml)?;
        Self::new(rules)
    }

    /// Validate, order and compile `rules`.
    ///
    /// Order is priority descending, then rule id, so the result does not
    /// depend on the order rules were declared in.
    pub fn new(mut rules: Vec<ClassificationRule>) -> Result<Self, ConfigError> {
        validate(&rules)?;
        rules.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));

        let mut compiler = KeywordCompiler::default();
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            let patterns = rule
                .patterns
                .iter()
                .map(|p| {
                    Regex::new(p).map_err(|source| ConfigError::Pattern {
                        rule: rule.id.clone(),
                        source,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            compiled.push(CompiledRule {
                any: compiler.compile_all(&rule.id, &rule.keywords)?,
                all: compiler.compile_all(&rule.id, &rule.all_keywords)?,
                exclude: compiler.compile_all(&rule.id, &rule.exclude)?,
                patterns,
                rule,
            });
        }
        Ok(Self { rules: compiled })
    }

    /// First rule, in priority order, matching an already normalized query.
    pub fn first_match(&self, normalized: &str) -> Option<&ClassificationRule> {
        self.rules
            .iter()
            .find(|r| r.matches(normalized))
            .map(|r| &r.rule)
    }

    /// Rules in evaluation order.
    pub fn rules(&self) -> impl Iterator<Item = &ClassificationRule> {
        self.rules.iter().map(|r| &r.rule)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn validate(rules: &[ClassificationRule]) -> Result<(), ConfigError> {
    let mut ids = HashSet::new();
    for rule in rules {
        if !ids.insert(rule.id.as_str()) {
            return Err(ConfigError::InvalidRules(format!("duplicate rule id '{}'", rule.id)));
        }
        if rule.backend.trim().is_empty() {
            return Err(ConfigError::InvalidRules(format!("rule '{}' has no backend", rule.id)));
        }
        if !(0.0..=1.0).contains(&rule.confidence) {
            return Err(ConfigError::InvalidRules(format!(
                "rule '{}' confidence {} is outside [0, 1]",
                rule.id, rule.confidence
            )));
        }
        if rule.keywords.is_empty() && rule.patterns.is_empty() && rule.all_keywords.is_empty() {
            return Err(ConfigError::InvalidRules(format!("rule '{}' has no matchers", rule.id)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::types::SearchMode;
    use proptest::prelude::*;

    fn rule(id: &str, backend: &str, priority: i32, keywords: &[&str]) -> ClassificationRule {
        ClassificationRule {
            id: id.to_string(),
            backend: backend.to_string(),
            priority,
            confidence: 0.9,
            reason: format!("{id} matched"),
            mode: SearchMode::Standard,
            domain: None,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            patterns: Vec::new(),
            all_keywords: Vec::new(),
            exclude: Vec::new(),
        }
    }

    #[test]
    fn test_builtin_rules_load() {
        let table = RuleTable::builtin().unwrap();
        assert!(table.len() >= 10);
        let priorities: Vec<i32> = table.rules().map(|r| r.priority).collect();
        assert!(priorities.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_single_word_keyword_respects_word_boundaries() {
        let table = RuleTable::new(vec![rule("ions", "chem", 10, &["cation"])]).unwrap();
        assert!(table.first_match("cation exchange capacity").is_some());
        assert!(table.first_match("what is a cation").is_some());
        assert!(table.first_match("location of the nearest cafe").is_none());
        assert!(table.first_match("cations").is_none());
    }

    #[test]
    fn test_phrase_keyword_matches_as_substring() {
        let table = RuleTable::new(vec![rule("r", "b", 1, &["research on"])]).unwrap();
        assert!(table.first_match("recent research on sleep").is_some());
        assert!(table.first_match("research about sleep").is_none());
    }

    #[test]
    fn test_keyword_with_symbols() {
        let table = RuleTable::new(vec![rule("cpp", "github", 1, &["c++"])]).unwrap();
        assert!(table.first_match("c++ json parser").is_some());
        assert!(table.first_match("modern c++").is_some());
        assert!(table.first_match("abc++").is_none());
    }

    #[test]
    fn test_higher_priority_wins() {
        let table = RuleTable::new(vec![
            rule("low", "wikipedia", 10, &["rust"]),
            rule("high", "github", 50, &["rust"]),
        ])
        .unwrap();
        assert_eq!(table.first_match("rust").unwrap().id, "high");
    }

    #[test]
    fn test_all_keywords_and_exclude() {
        let mut r = rule("both", "b", 1, &[]);
        r.all_keywords = vec!["census".into(), "2020".into()];
        r.exclude = vec!["paper".into()];
        let table = RuleTable::new(vec![r]).unwrap();
        assert!(table.first_match("census 2020 results").is_some());
        assert!(table.first_match("census results").is_none());
        assert!(table.first_match("census 2020 paper").is_none());
    }

    #[test]
    fn test_invalid_tables_are_rejected() {
        let dup = vec![rule("a", "x", 1, &["k"]), rule("a", "y", 2, &["j"])];
        assert!(matches!(RuleTable::new(dup), Err(ConfigError::InvalidRules(_))));

        let empty = vec![rule("a", "x", 1, &[])];
        assert!(matches!(RuleTable::new(empty), Err(ConfigError::InvalidRules(_))));

        let mut bad = rule("a", "x", 1, &[]);
        bad.patterns = vec!["(unclosed".into()];
        assert!(matches!(RuleTable::new(vec![bad]), Err(ConfigError::Pattern { .. })));
    }

    const SAMPLE_QUERIES: &[&str] = &[
        "papers on transformer architecture attention mechanisms",
        "where is the eiffel tower",
        "rust http library",
        "clinical trials for migraine",
        "latest news on fusion",
        "van gogh painting",
        "who was ada lovelace",
        "12 * 7",
        "something nobody wrote a rule for",
    ];

    proptest! {
        #[test]
        fn prop_rule_order_does_not_change_results(
            shuffled in Just(
                RuleTable::builtin().unwrap().rules().cloned().collect::<Vec<_>>()
            ).prop_shuffle()
        ) {
            let reference = RuleTable::builtin().unwrap();
            let table = RuleTable::new(shuffled).unwrap();
            for query in SAMPLE_QUERIES {
                prop_assert_eq!(
                    reference.first_match(query).map(|r| r.id.clone()),
                    table.first_match(query).map(|r| r.id.clone())
                );
            }
        }

        #[test]
        fn prop_ties_break_by_id(swap in any::<bool>()) {
            let mut rules = vec![rule("beta", "b", 5, &["tie"]), rule("alpha", "a", 5, &["tie"])];
            if swap {
                rules.reverse();
            }
            let table = RuleTable::new(rules).unwrap();
            prop_assert_eq!(table.first_match("tie").map(|r| r.id.as_str()), Some("alpha"));
        }
    }
}
