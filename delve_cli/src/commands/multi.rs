use crate::cli::{Cli, OutputFormat};
use crate::commands::{engine, spinner, CommandError, Result};
use crate::output::{format_output, OutputData};
use delve_core::SearchOptions;
use tracing::info;

pub async fn run(cli: &Cli, query: &str, backends: &[String], limit: usize) -> Result<()> {
    let engine = engine()?;
    let backends: Vec<String> = backends
        .iter()
        .map(|b| b.trim().to_string())
        .filter(|b| !b.is_empty())
        .collect();

    let progress = (cli.output == OutputFormat::Pretty)
        .then(|| spinner(format!("Searching {} backends...", backends.len())));
    let results = engine
        .search_multiple(query, &backends, &SearchOptions::new().max_results(limit))
        .await;
    if let Some(progress) = progress {
        progress.finish_and_clear();
    }

    if results.is_empty() {
        return Err(CommandError::NoResults);
    }
    if results.len() < backends.len() {
        info!(
            requested = backends.len(),
            answered = results.len(),
            "some backends returned nothing"
        );
    }
    format_output(
        &OutputData::MultiResults {
            query: query.to_string(),
            results,
        },
        &cli.output,
    )
}
