//! Analyze command implementation
//!
//! Starts one run in-process and polls the store until it finishes,
//! printing each phase change.

use super::output::Output;
use crate::runs::{Phase, Run};
use crate::types::{Company, Result};
use crate::AppState;
use std::time::Duration;

/// Run an analysis to completion and return the finished run
pub async fn run(state: &AppState, company: Company, poll: Duration, output: &Output) -> Result<Run> {
    output.header(&format!("Analyzing {}", company.name));

    let created = state.orchestrator.start_run(company)?;
    if created.cached {
        output.info("Serving a recent run from the cache");
    }

    let mut last_phase: Option<Phase> = None;
    let mut interval = tokio::time::interval(poll);
    loop {
        interval.tick().await;
        let run = state.store.get(&created.run_id)?;

        if run.current_phase != last_phase {
            if let Some(phase) = run.current_phase {
                output.run_status(&run.id, run.status, &format!("phase {}", phase));
            }
            last_phase = run.current_phase;
        }

        if run.status.is_terminal() {
            print_summary(&run, output);
            return Ok(run);
        }
    }
}

fn print_summary(run: &Run, output: &Output) {
    output.run_status(&run.id, run.status, "finished");
    output.kv(
        "search credits",
        &format!("{:.0} / {:.0}", run.cost.search_credits, run.cost.search_credit_cap),
    );
    output.kv(
        "llm usd",
        &format!("{:.4} / {:.2}", run.cost.llm_usd, run.cost.llm_usd_cap),
    );
    output.kv("sources", &run.sources.len().to_string());
    output.kv("patents", &run.patents.len().to_string());
    output.kv("founders", &run.founders.len().to_string());

    for (agent, summary) in &run.agents {
        output.list_item(&format!(
            "{:<13} {:?} in {} ms ({} attempt{})",
            agent.as_str(),
            summary.outcome,
            summary.duration_ms,
            summary.attempts,
            if summary.attempts == 1 { "" } else { "s" }
        ));
    }
    for note in &run.notes {
        output.warning(&note.message);
    }
    for error in &run.errors {
        output.error(&error.message);
    }
}
