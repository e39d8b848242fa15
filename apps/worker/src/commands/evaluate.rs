//! `nlu-worker evaluate`

use super::print_json;
use anyhow::{bail, Context, Result};
use nlu_orchestrator::{TaskOutput, TaskRouter};

pub async fn execute(router: &TaskRouter, update_id: &str, by: &str, json: bool) -> Result<()> {
    let output = router.evaluate_update(update_id, by).await.context("Evaluation failed")?;

    if json {
        return print_json(&output);
    }

    let TaskOutput::Evaluated(report) = output else {
        bail!("unexpected output for an evaluation task");
    };
    println!("Evaluated update {} ({} of {} correct, accuracy {:.2})", report.update_id, report.correct, report.total, report.accuracy);
    for miss in &report.misclassified {
        println!(
            "  {:?}: expected {}, got {}",
            miss.text,
            miss.expected,
            miss.predicted.as_deref().unwrap_or("nothing")
        );
    }
    Ok(())
}
