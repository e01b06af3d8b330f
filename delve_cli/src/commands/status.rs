use crate::cli::Cli;
use crate::commands::{engine, Result};
use crate::output::{format_output, BackendStatus, OutputData, StatusReport};
use delve_core::SearchEngine;

pub fn run(cli: &Cli) -> Result<()> {
    let engine = engine()?;
    format_output(&OutputData::Status(report(&engine)), &cli.output)
}

fn report(engine: &SearchEngine) -> StatusReport {
    let available = engine.provider_status();
    let circuits = engine.circuit_states();
    let backends = engine
        .catalog()
        .backends()
        .iter()
        .map(|spec| BackendStatus {
            id: spec.id.clone(),
            category: spec.category,
            available: available.get(&spec.id).copied().unwrap_or(false),
            fallback_eligible: spec.fallback_eligible,
            circuit: circuits.get(&spec.id).copied(),
            fallbacks: engine.catalog().chain(&spec.id),
        })
        .collect();
    StatusReport {
        backends,
        cache: engine.cache_stats(),
    }
}
