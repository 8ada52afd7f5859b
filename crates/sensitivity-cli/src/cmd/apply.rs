use crate::output::{print_json, print_table};
use anyhow::Context;
use sensitivity_core::request::ClassificationRequest;
use sensitivity_core::types::Tier;
use sensitivity_core::WorkflowOutcome;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Run the saga once for a payload read from `file` or stdin.
///
/// The payload is validated before any client is built, so a bad payload
/// fails without touching secrets or the network.
pub fn run(
    config_path: &Path,
    tier: Option<&str>,
    file: Option<PathBuf>,
    json: bool,
) -> anyhow::Result<()> {
    let raw = match &file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read payload from stdin")?;
            buf
        }
    };

    let request = match tier {
        Some(t) => ClassificationRequest::parse_with_tier(&raw, t.parse::<Tier>()?)?,
        None => ClassificationRequest::parse(&raw)?,
    };

    let config = super::load_config(config_path)?;
    let orchestrator = super::build_orchestrator(&config)?;

    let rt = tokio::runtime::Runtime::new()?;
    let outcome = rt.block_on(orchestrator.run(&request))?;

    if json {
        print_json(&outcome)?;
    } else {
        print_outcome(&outcome);
    }

    if !outcome.overall_success {
        anyhow::bail!(
            "classification of request {} did not complete (state: {})",
            outcome.request_id,
            outcome.state
        );
    }
    Ok(())
}

fn print_outcome(outcome: &WorkflowOutcome) {
    println!("Run:     {}", outcome.run_id);
    println!("Request: {} (group {})", outcome.request_id, outcome.group_id);
    println!("Tier:    {}", outcome.tier);
    println!("State:   {}", outcome.state);
    match &outcome.label_error {
        Some(e) => println!("Label:   failed: {e}"),
        None => println!("Label:   applied"),
    }
    if outcome.step_results.is_empty() {
        return;
    }
    println!();
    let rows = outcome
        .step_results
        .iter()
        .map(|r| {
            vec![
                r.name.clone(),
                r.target.to_string(),
                if r.succeeded { "ok" } else { "failed" }.to_string(),
                r.error_detail.clone().unwrap_or_default(),
            ]
        })
        .collect();
    print_table(&["STEP", "TARGET", "RESULT", "DETAIL"], rows);
}
