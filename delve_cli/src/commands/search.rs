use crate::cli::{Cli, OutputFormat};
use crate::commands::{engine, spinner, Result};
use crate::output::{format_output, OutputData};
use delve_core::SearchOptions;
use tracing::debug;

pub async fn run(
    cli: &Cli,
    query: &str,
    backend: Option<&str>,
    limit: usize,
    include_domains: &[String],
    exclude_domains: &[String],
) -> Result<()> {
    let engine = engine()?;
    let options = build_options(backend, limit, include_domains, exclude_domains);

    let progress = (cli.output == OutputFormat::Pretty).then(|| {
        spinner(match backend {
            Some(b) => format!("Searching {b} for '{query}'..."),
            None => format!("Searching for '{query}'..."),
        })
    });
    let outcome = engine.search(query, &options).await;
    if let Some(progress) = progress {
        progress.finish_and_clear();
    }

    let result = outcome?;
    debug!(
        backend = %result.backend_used,
        fallbacks = result.fallback_history.len(),
        "search finished"
    );
    format_output(&OutputData::SearchResult(result), &cli.output)
}

fn build_options(
    backend: Option<&str>,
    limit: usize,
    include_domains: &[String],
    exclude_domains: &[String],
) -> SearchOptions {
    let mut options = SearchOptions::new().max_results(limit);
    if let Some(backend) = backend {
        options = options.force_backend(backend);
    }
    for domain in include_domains {
        options = options.include_domain(domain);
    }
    for domain in exclude_domains {
        options = options.exclude_domain(domain);
    }
    options
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_options() {
        let options = build_options(
            Some("github"),
            5,
            &["github.com".to_string()],
            &["gist.github.com".to_string()],
        );
        assert_eq!(options.force_backend.as_deref(), Some("github"));
        assert_eq!(options.limit(), 5);
        assert_eq!(options.include_domains, vec!["github.com"]);
        assert_eq!(options.exclude_domains, vec!["gist.github.com"]);
    }
}
