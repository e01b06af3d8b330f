pub mod classify;
pub mod multi;
pub mod rules;
pub mod search;
pub mod status;

use delve_core::{ConfigError, SearchEngine, SearchError};
use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Search(#[from] SearchError),

    #[error("No backend returned results")]
    NoResults,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl CommandError {
    /// A follow-up suggestion for errors the user can act on.
    pub fn hint(&self) -> Option<String> {
        match self {
            CommandError::Search(SearchError::UnknownBackend(_)) => {
                Some("run 'delve status' to list backend ids".to_string())
            }
            CommandError::Search(SearchError::ChainExhausted { attempted, .. }) => Some(format!(
                "tried {}; rerun with -v for per-backend errors",
                attempted.join(", ")
            )),
            CommandError::NoResults => {
                Some("check the backend ids with 'delve status'".to_string())
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CommandError>;

/// Engine from the user's config file and environment.
pub fn engine() -> Result<SearchEngine> {
    Ok(SearchEngine::from_env()?)
}

/// Spinner on stderr, hidden when stderr is not a terminal.
pub fn spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message);
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));
    spinner
}
