use crate::cli::Cli;
use crate::commands::{engine, Result};
use crate::output::{format_output, OutputData};

pub async fn run(cli: &Cli, query: &str) -> Result<()> {
    let engine = engine()?;
    let classification = engine.classify(query).await;
    let chain = engine.catalog().chain(&classification.backend);
    format_output(
        &OutputData::Classification {
            query: query.to_string(),
            classification,
            chain,
        },
        &cli.output,
    )
}
