//! `streamflow replay`: feed a recorded event log through the engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use colored::Colorize;
use serde::Serialize;
use serde_json::Value;
use streamflow_core::{ChannelTransport, EngineNotice, EngineRunner, StopOutcome};
use streamflow_traits::{CommitOutcome, FinalMessage, InboundEvent, ToolCallStatus};
use tracing::{debug, info};

use crate::cli::{OutputFormat, ReplayArgs};
use crate::config::CliConfig;
use crate::paths;
use crate::store::JsonFileStore;

const DEFAULT_CHAT_ID: &str = "default";
const DEFAULT_LABEL: &str = "Thinking...";
const DELAY_KEY: &str = "delayMs";

/// One line of an event log
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayStep {
    pub delay: Duration,
    pub event: InboundEvent,
}

/// Parse a JSON Lines event log. Blank lines are skipped.
pub fn parse_event_log(content: &str) -> Result<Vec<ReplayStep>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            parse_step(line).with_context(|| format!("Invalid event on line {}", index + 1))
        })
        .collect()
}

fn parse_step(line: &str) -> Result<ReplayStep> {
    let mut value: Value = serde_json::from_str(line)?;
    let Some(object) = value.as_object_mut() else {
        bail!("expected a JSON object");
    };
    let delay_ms = match object.remove(DELAY_KEY) {
        Some(delay) => delay
            .as_u64()
            .with_context(|| format!("{DELAY_KEY} must be a non-negative integer"))?,
        None => 0,
    };
    let event: InboundEvent = serde_json::from_value(value)?;
    Ok(ReplayStep {
        delay: Duration::from_millis(delay_ms),
        event,
    })
}

fn load_event_log(path: &Path) -> Result<Vec<ReplayStep>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read event log {}", path.display()))?;
    parse_event_log(&content)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplayReport {
    chat_id: String,
    request_id: String,
    status: &'static str,
    history: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<FinalMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub async fn run(args: ReplayArgs, config: &CliConfig, format: OutputFormat) -> Result<()> {
    let steps = load_event_log(&args.events)?;

    let chat_id = args
        .chat_id
        .or_else(|| config.default.chat_id.clone())
        .unwrap_or_else(|| DEFAULT_CHAT_ID.to_string());
    let request_id = args
        .request_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let label = args
        .label
        .or_else(|| config.default.label.clone())
        .unwrap_or_else(|| DEFAULT_LABEL.to_string());
    let history = match args.history {
        Some(path) => path,
        None => match &config.default.history_path {
            Some(path) => PathBuf::from(path),
            None => paths::history_path()?,
        },
    };

    let engine_config = config.engine.clone();
    let timeout = args
        .timeout_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| engine_config.watchdog_timeout());

    let store = Arc::new(JsonFileStore::new(&history));
    store
        .push_placeholder(
            &chat_id,
            FinalMessage::placeholder(label.clone(), engine_config.envelope_for(&chat_id)),
        )
        .await?;
    debug!(history = %store.path().display(), "Placeholder written");

    let transport = ChannelTransport::new();
    let (handle, mut notices) = EngineRunner::spawn(
        engine_config,
        chat_id.clone(),
        Arc::new(transport.clone()),
        store.clone(),
    )?;
    handle
        .start_with_timeout(request_id.clone(), Some(label), timeout)
        .await?;
    info!(chat_id = %chat_id, request_id = %request_id, events = steps.len(), "Replaying event log");

    for (index, step) in steps.into_iter().enumerate() {
        if args.stop_after == Some(index) {
            break;
        }
        if !step.delay.is_zero() {
            tokio::time::sleep(step.delay).await;
        }
        if !transport.push(&request_id, step.event) {
            debug!(index, "Subscription closed, ending replay");
            break;
        }
    }

    if args.stop_after.is_some() {
        let outcome = handle.request_stop().confirm().await?;
        if outcome == StopOutcome::Inactive {
            debug!("Stream had already ended before the stop");
        }
    }

    let notice = notices
        .recv()
        .await
        .context("Stream engine stopped without reporting an outcome")?;
    handle.shutdown().await?;

    let mut report = ReplayReport {
        chat_id,
        request_id,
        status: "finalized",
        history,
        outcome: None,
        message: None,
        error: None,
    };
    let failure = match notice {
        EngineNotice::Finalized {
            message, outcome, ..
        } => {
            report.outcome = Some(match outcome {
                CommitOutcome::ReplacedPlaceholder => "replacedPlaceholder",
                CommitOutcome::Appended => "appended",
            });
            report.message = Some(message);
            None
        }
        EngineNotice::Cancelled { .. } => {
            report.status = "cancelled";
            None
        }
        EngineNotice::Failed { error, .. } => {
            report.status = "failed";
            report.error = Some(error.to_string());
            Some(error)
        }
    };

    if format.is_json() {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_text(&report);
    }

    match failure {
        Some(error) => Err(error.into()),
        None => Ok(()),
    }
}

fn print_text(report: &ReplayReport) {
    match (&report.message, report.status) {
        (Some(message), _) => {
            println!("{}", message.payload);
            println!();
            if let Some(calls) = &message.tool_calls {
                for call in calls {
                    let status = match call.record.status {
                        ToolCallStatus::Completed => "completed".green(),
                        ToolCallStatus::Failed => "failed".red(),
                        ToolCallStatus::Thinking => "thinking".yellow(),
                    };
                    let detail = call.record.user_message.as_deref().unwrap_or_default();
                    println!("  [{status}] {} {}", call.call_id, detail.dimmed());
                }
            }
            println!(
                "{} {} into {} ({}, thought for {}s)",
                "Finalized".green().bold(),
                report.request_id,
                report.history.display(),
                report.outcome.unwrap_or("appended"),
                message.thinking_duration
            );
        }
        (None, "cancelled") => {
            println!(
                "{} {} before any content arrived",
                "Cancelled".yellow().bold(),
                report.request_id
            );
        }
        (None, _) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_delay_and_event() {
        let steps = parse_event_log(
            "{\"progress\": 0.5, \"data\": \"Hi\", \"delayMs\": 25}\n\n{\"progress\": 1, \"result\": \"!\"}\n",
        )
        .unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].delay, Duration::from_millis(25));
        assert_eq!(steps[0].event.data.as_deref(), Some("Hi"));
        assert_eq!(steps[1].delay, Duration::ZERO);
        assert!(steps[1].event.is_complete());
        assert_eq!(steps[1].event.data.as_deref(), Some("!"));
    }

    #[test]
    fn keeps_info_payload() {
        let steps =
            parse_event_log(r#"{"progress": 0.1, "info": {"ephemeral": true}}"#).unwrap();
        assert_eq!(steps[0].event.info, Some(json!({"ephemeral": true})));
    }

    #[test]
    fn reports_bad_line_number() {
        let err = parse_event_log("{\"progress\": 0.1}\nnot json").unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
    }

    #[test]
    fn rejects_negative_delay() {
        assert!(parse_event_log(r#"{"progress": 0.1, "delayMs": -5}"#).is_err());
    }
}
