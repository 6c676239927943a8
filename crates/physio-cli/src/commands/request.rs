use super::Context;
use anyhow::{Context as _, Result};
use physio_application::ApiRequest;
use physio_infrastructure::{ChannelAuditSink, FanoutAuditSink, TracingAuditSink};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

/// One step of a replay script.
#[derive(Debug, Deserialize)]
pub struct ScriptStep {
    pub token: String,
    pub request: ApiRequest,
}

pub fn parse_script(raw: &str) -> Result<Vec<ScriptStep>> {
    serde_json::from_str(raw).context("Script must be a JSON array of {token, request} steps")
}

pub async fn run_one(context: &Context, token: &str, raw: &str) -> Result<()> {
    let request: ApiRequest = serde_json::from_str(raw).context("Invalid request JSON")?;
    let api = context.api().await?;
    let response = api.handle(token, request).await;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

/// Replays every step in order against one API instance, printing one
/// response per line. Failed steps do not stop the replay.
pub async fn run_script(context: &Context, script: &Path, print_audit: bool) -> Result<()> {
    let raw = std::fs::read_to_string(script)
        .with_context(|| format!("Failed to read script {}", script.display()))?;
    let steps = parse_script(&raw)?;

    let (channel, mut events) = ChannelAuditSink::new(steps.len().saturating_mul(2).max(16));
    let audit = FanoutAuditSink::new(vec![Arc::new(TracingAuditSink), Arc::new(channel)]);
    let api = context.api_with_audit(Arc::new(audit)).await?;

    let mut failures = 0usize;
    for (index, step) in steps.into_iter().enumerate() {
        let route = step.request.route();
        let response = api.handle(&step.token, step.request).await;
        if !response.is_success() {
            failures += 1;
        }
        tracing::debug!(step = index, route, status = response.status, "Replayed step");
        println!("{}", serde_json::to_string(&response)?);
    }

    if print_audit {
        while let Ok(event) = events.try_recv() {
            println!("{}", serde_json::to_string(&event)?);
        }
    }

    tracing::info!(failures, "Script finished");
    Ok(())
}
