//! `nlu-worker parse`

use super::print_json;
use anyhow::{bail, Context, Result};
use nlu_orchestrator::{TaskOutput, TaskRouter};

pub async fn execute(router: &TaskRouter, update_id: &str, text: &str, json: bool) -> Result<()> {
    let output = router.parse_text(update_id, text).await.context("Parse failed")?;

    if json {
        return print_json(&output);
    }

    let TaskOutput::Parsed(parsed) = output else {
        bail!("unexpected output for a parse task");
    };
    match parsed.intent {
        Some(intent) => println!("intent: {} ({:.2})", intent.name, intent.confidence),
        None => println!("intent: none"),
    }
    for entity in &parsed.entities {
        println!("entity: {}", entity.0);
    }
    Ok(())
}
