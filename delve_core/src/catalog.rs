//! Backend catalog: categories, fallback chains and per-backend timeouts.
//!
//! The catalog is data. The built-in table is embedded from
//! `data/backends.yaml` and can be replaced with a file of the same shape.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

const BUILTIN_CATALOG: &str = include_str!("../data/backends.yaml");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendCategory {
    General,
    WebSearch,
    Encyclopedia,
    AcademicPapers,
    Academic,
    Biomedical,
    TechNews,
    Code,
    Geo,
    Government,
    Museum,
    Computational,
}

impl BackendCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendCategory::General => "general",
            BackendCategory::WebSearch => "web_search",
            BackendCategory::Encyclopedia => "encyclopedia",
            BackendCategory::AcademicPapers => "academic_papers",
            BackendCategory::Academic => "academic",
            BackendCategory::Biomedical => "biomedical",
            BackendCategory::TechNews => "tech_news",
            BackendCategory::Code => "code",
            BackendCategory::Geo => "geo",
            BackendCategory::Government => "government",
            BackendCategory::Museum => "museum",
            BackendCategory::Computational => "computational",
        }
    }
}

impl std::fmt::Display for BackendCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSpec {
    pub id: String,
    pub category: BackendCategory,
    #[serde(default)]
    pub description: String,
    /// Whether zero results from this backend moves the search on
    #[serde(default)]
    pub fallback_eligible: bool,
    #[serde(default)]
    pub fallbacks: Vec<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    terminal: String,
    #[serde(default)]
    universal: Vec<String>,
    backends: Vec<BackendSpec>,
}

#[derive(Debug, Clone)]
pub struct BackendCatalog {
    backends: Vec<BackendSpec>,
    index: HashMap<String, usize>,
    universal: Vec<String>,
    terminal: String,
}

impl BackendCatalog {
    /// The embedded default catalog.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_yaml_str(BUILTIN_CATALOG)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse and validate a catalog.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let file: CatalogFile = serde_yaml::from_str(yaml)?;
        Self::new(file.backends, file.universal, file.terminal)
    }

    pub fn new(
        backends: Vec<BackendSpec>,
        universal: Vec<String>,
        terminal: String,
    ) -> Result<Self, ConfigError> {
        let mut index = HashMap::with_capacity(backends.len());
        for (i, spec) in backends.iter().enumerate() {
            if index.insert(spec.id.clone(), i).is_some() {
                return Err(ConfigError::InvalidCatalog(format!(
                    "backend '{}' declared twice",
                    spec.id
                )));
            }
        }
        let catalog = Self {
            backends,
            index,
            universal,
            terminal,
        };
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn get(&self, id: &str) -> Option<&BackendSpec> {
        self.index.get(id).map(|&i| &self.backends[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Backend IDs in declaration order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.backends.iter().map(|b| b.id.as_str())
    }

    pub fn backends(&self) -> &[BackendSpec] {
        &self.backends
    }

    pub fn terminal(&self) -> &str {
        &self.terminal
    }

    pub fn universal(&self) -> &[String] {
        &self.universal
    }

    pub fn category(&self, id: &str) -> Option<BackendCategory> {
        self.get(id).map(|b| b.category)
    }

    pub fn is_fallback_eligible(&self, id: &str) -> bool {
        self.get(id).is_some_and(|b| b.fallback_eligible)
    }

    /// Per-backend timeout, or `default` when the catalog does not set one.
    pub fn timeout(&self, id: &str, default: Duration) -> Duration {
        self.get(id)
            .and_then(|b| b.timeout_ms)
            .map(Duration::from_millis)
            .unwrap_or(default)
    }

    /// Ordered alternates for `id`, not including `id` itself.
    ///
    /// The backend's own fallbacks come first, then the universal list. A
    /// universal member only continues with the universal entries after it.
    /// The last element is always the terminal backend, unless `id` is the
    /// terminal, in which case the chain is empty.
    pub fn chain(&self, id: &str) -> Vec<String> {
        if id == self.terminal {
            return Vec::new();
        }
        let own = self.get(id).map(|b| b.fallbacks.as_slice()).unwrap_or(&[]);
        let universal_tail = match self.universal.iter().position(|u| u == id) {
            Some(pos) => &self.universal[pos + 1..],
            None => &self.universal[..],
        };

        let mut seen: HashSet<&str> = HashSet::from([id]);
        let mut chain = Vec::new();
        for candidate in own.iter().chain(universal_tail) {
            if candidate != &self.terminal && seen.insert(candidate.as_str()) {
                chain.push(candidate.clone());
            }
        }
        chain.push(self.terminal.clone());
        chain
    }

    /// Structural checks run at load time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::InvalidCatalog(msg));

        let Some(terminal) = self.get(&self.terminal) else {
            return invalid(format!("terminal backend '{}' is not declared", self.terminal));
        };
        if terminal.fallback_eligible {
            return invalid(format!("terminal backend '{}' must not be fallback-eligible", terminal.id));
        }
        if !terminal.fallbacks.is_empty() {
            return invalid(format!("terminal backend '{}' must not declare fallbacks", terminal.id));
        }

        for id in &self.universal {
            match self.get(id) {
                None => return invalid(format!("universal backend '{id}' is not declared")),
                Some(spec) if !spec.fallbacks.is_empty() => {
                    return invalid(format!("universal backend '{id}' must not declare fallbacks"))
                }
                Some(_) => {}
            }
        }
        if self.universal.last().is_some_and(|last| last != &self.terminal) {
            return invalid("universal list must end with the terminal backend".to_string());
        }

        for spec in &self.backends {
            for fallback in &spec.fallbacks {
                if !self.contains(fallback) {
                    return invalid(format!(
                        "backend '{}' falls back to undeclared '{fallback}'",
                        spec.id
                    ));
                }
                if fallback == &spec.id {
                    return invalid(format!("backend '{}' falls back to itself", spec.id));
                }
            }
        }

        self.check_acyclic()?;

        for spec in &self.backends {
            let chain = self.chain(&spec.id);
            if spec.id != self.terminal && chain.last() != Some(&self.terminal) {
                return invalid(format!("chain for '{}' does not end at the terminal", spec.id));
            }
        }
        Ok(())
    }

    /// Depth-first search over the per-backend fallback edges.
    fn check_acyclic(&self) -> Result<(), ConfigError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            New,
            Active,
            Done,
        }

        fn visit(
            catalog: &BackendCatalog,
            i: usize,
            marks: &mut [Mark],
            path: &mut Vec<usize>,
        ) -> Result<(), ConfigError> {
            match marks[i] {
                Mark::Done => return Ok(()),
                Mark::Active => {
                    let cycle: Vec<&str> = path
                        .iter()
                        .skip_while(|&&p| p != i)
                        .map(|&p| catalog.backends[p].id.as_str())
                        .chain(std::iter::once(catalog.backends[i].id.as_str()))
                        .collect();
                    return Err(ConfigError::InvalidCatalog(format!(
                        "fallback cycle: {}",
                        cycle.join(" -> ")
                    )));
                }
                Mark::New => {}
            }
            marks[i] = Mark::Active;
            path.push(i);
            for fallback in &catalog.backends[i].fallbacks {
                if let Some(&next) = catalog.index.get(fallback) {
                    visit(catalog, next, marks, path)?;
                }
            }
            path.pop();
            marks[i] = Mark::Done;
            Ok(())
        }

        let mut marks = vec![Mark::New; self.backends.len()];
        let mut path = Vec::new();
        for i in 0..self.backends.len() {
            visit(self, i, &mut marks, &mut path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(yaml: &str) -> Result<BackendCatalog, ConfigError> {
        BackendCatalog::from_yaml_str(yaml)
    }

    #[test]
    fn test_builtin_catalog_is_valid() {
        let catalog = BackendCatalog::builtin().unwrap();
        assert_eq!(catalog.terminal(), "duckduckgo");
        assert!(catalog.contains("semantic_scholar"));
        assert!(!catalog.is_fallback_eligible("duckduckgo"));
        assert!(catalog.is_fallback_eligible("met_museum"));
    }

    #[test]
    fn test_every_chain_terminates_at_the_terminal() {
        let catalog = BackendCatalog::builtin().unwrap();
        let n = catalog.backends().len();
        for id in catalog.ids() {
            let chain = catalog.chain(id);
            assert!(chain.len() < n, "chain for {id} too long: {chain:?}");
            if id == catalog.terminal() {
                assert!(chain.is_empty());
                continue;
            }
            assert_eq!(chain.last().map(String::as_str), Some("duckduckgo"), "{id}");
            assert!(!chain.iter().any(|c| c == id), "{id} appears in its own chain");

            let unique: HashSet<&String> = chain.iter().collect();
            assert_eq!(unique.len(), chain.len(), "duplicate in chain for {id}");
        }
    }

    #[test]
    fn test_walking_first_hops_always_reaches_terminal() {
        let catalog = BackendCatalog::builtin().unwrap();
        for start in catalog.ids() {
            let mut current = start.to_string();
            let mut visited = HashSet::new();
            while current != catalog.terminal() {
                assert!(visited.insert(current.clone()), "revisited {current} from {start}");
                current = catalog.chain(&current)[0].clone();
            }
        }
    }

    #[test]
    fn test_chain_order() {
        let catalog = BackendCatalog::builtin().unwrap();
        assert_eq!(
            catalog.chain("semantic_scholar"),
            vec!["openalex", "tavily", "duckduckgo"]
        );
        assert_eq!(catalog.chain("tavily"), vec!["duckduckgo"]);
        assert_eq!(catalog.chain("exa"), vec!["tavily", "duckduckgo"]);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let err = catalog(
            r#"
terminal: t
universal: [t]
backends:
  - { id: t, category: general }
  - { id: a, category: academic, fallbacks: [b] }
  - { id: b, category: academic, fallbacks: [a] }
"#,
        )
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("cycle"), "{msg}");
    }

    #[test]
    fn test_undeclared_fallback_is_rejected() {
        let err = catalog(
            r#"
terminal: t
universal: [t]
backends:
  - { id: t, category: general }
  - { id: a, category: academic, fallbacks: [ghost] }
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_eligible_terminal_is_rejected() {
        let err = catalog(
            r#"
terminal: t
backends:
  - { id: t, category: general, fallback_eligible: true }
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidCatalog(_)));
    }

    #[test]
    fn test_timeout_falls_back_to_default() {
        let catalog = catalog(
            r#"
terminal: t
backends:
  - { id: t, category: general, timeout_ms: 1200 }
  - { id: a, category: code }
"#,
        )
        .unwrap();
        let default = Duration::from_secs(15);
        assert_eq!(catalog.timeout("t", default), Duration::from_millis(1200));
        assert_eq!(catalog.timeout("a", default), default);
        assert_eq!(catalog.chain("a"), vec!["t"]);
    }
}
