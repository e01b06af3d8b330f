use crate::cli::Cli;
use crate::commands::{engine, Result};
use crate::output::{format_output, OutputData};

pub fn run(cli: &Cli) -> Result<()> {
    let engine = engine()?;
    let rules = engine.rules().rules().cloned().collect();
    format_output(&OutputData::Rules(rules), &cli.output)
}
