//! `nlu-worker train`

use super::{cancel_on_ctrl_c, print_json};
use anyhow::{bail, Context, Result};
use nlu_orchestrator::{TaskOutput, TaskRouter};

pub async fn execute(router: &TaskRouter, update_id: &str, by: &str, json: bool) -> Result<()> {
    let cancel = cancel_on_ctrl_c();
    let output = router
        .train_update(update_id, by, &cancel)
        .await
        .with_context(|| format!("Training update {update_id} failed"))?;

    if json {
        return print_json(&output);
    }

    let TaskOutput::Trained { update_id, model, reporting_errors } = output else {
        bail!("unexpected output for a training task");
    };
    println!("Trained update {update_id}");
    println!("  project:  {}", model.project_name);
    println!("  model:    {}", model.model_name);
    println!("  location: {}", model.location.display());
    for err in reporting_errors {
        println!("  warning:  {err}");
    }
    Ok(())
}
