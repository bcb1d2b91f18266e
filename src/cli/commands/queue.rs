//! Queue management commands.

use colored::Colorize;
use serde_json::Value;
use tracing::warn;

use super::Context;
use crate::cli::args::OutputFormat;
use crate::error::QueueError;
use crate::output::{format_items, format_reports, format_stats, to_json};
use crate::producer::{Producer, QueueReason, Submission};
use crate::queue::QueueType;
use crate::replay::{DrainReport, ReplayEngine};

fn parse_payload(payload: &str) -> Result<Value, QueueError> {
    Ok(serde_json::from_str(payload)?)
}

/// Queue an operation without attempting delivery.
///
/// # Errors
///
/// Returns [`QueueError::UnknownType`] for a name outside the closed set,
/// or an error if the payload is not JSON or the store is unavailable.
pub fn enqueue(ctx: &Context, queue_type: &str, payload: &str) -> Result<String, QueueError> {
    // Validate everything before the store is opened
    let queue_type = queue_type.parse::<QueueType>()?;
    let payload = parse_payload(payload)?;

    let queue = ctx.open_queue()?;
    let item = queue.enqueue(queue_type, payload)?;

    match ctx.format {
        OutputFormat::Json => to_json(&item),
        OutputFormat::Pretty => Ok(format!(
            "Queued {} operation (ID: {})",
            queue_type.display_name(),
            item.id.unwrap_or(0)
        )),
    }
}

/// Show pending operations of one type.
///
/// # Errors
///
/// Returns an error if the type is unknown or the store cannot be read.
pub fn peek(ctx: &Context, queue_type: &str) -> Result<String, QueueError> {
    let queue_type = queue_type.parse::<QueueType>()?;
    let items = ctx.open_queue()?.peek(queue_type)?;
    format_items(queue_type, &items, ctx.format)
}

/// Show pending counts.
///
/// # Errors
///
/// Returns an error if the store cannot be read.
pub fn status(ctx: &Context) -> Result<String, QueueError> {
    let stats = ctx.open_queue()?.stats()?;
    format_stats(&stats, ctx.format)
}

/// Run drain passes in the foreground.
///
/// Without a background coordinator the retry re-triggers have nowhere to
/// go, so failed items simply wait for the next invocation. With `--all`, a
/// type whose pass fails is logged and the remaining types still drain.
///
/// # Errors
///
/// Returns an error if the type is unknown, the store cannot be opened, or
/// a single-type pass fails.
pub fn drain(ctx: &Context, queue_type: Option<&str>, all: bool) -> Result<String, QueueError> {
    let queue_type = match queue_type {
        Some(name) if !all => Some(name.parse::<QueueType>()?),
        _ => None,
    };

    let queue = ctx.open_queue()?;
    let transport = ctx.transport()?;
    let engine = ReplayEngine::new(queue.store(), &transport).with_policy(ctx.policy());

    let reports = match queue_type {
        Some(queue_type) => vec![engine.drain(queue_type)?],
        None => drain_each(QueueType::ALL, |queue_type| engine.drain(queue_type)),
    };

    format_reports(&reports, ctx.format)
}

/// Run `pass` for every type, keeping the reports of those that succeed.
fn drain_each<F>(types: impl IntoIterator<Item = QueueType>, mut pass: F) -> Vec<DrainReport>
where
    F: FnMut(QueueType) -> Result<DrainReport, QueueError>,
{
    types
        .into_iter()
        .filter_map(|queue_type| match pass(queue_type) {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(queue = %queue_type, error = %e, "drain pass failed");
                None
            },
        })
        .collect()
}

/// Send an operation directly, falling back to the queue.
///
/// # Errors
///
/// Returns an error if the type is unknown, the payload is not JSON, or the
/// operation had to be queued and could not be persisted.
pub fn send(
    ctx: &Context,
    queue_type: &str,
    payload: &str,
    offline: bool,
) -> Result<String, QueueError> {
    let queue_type = queue_type.parse::<QueueType>()?;
    let payload = parse_payload(payload)?;

    let queue = ctx.open_queue()?;
    let transport = ctx.transport()?;
    let submission = Producer::new(&queue, &transport).submit(queue_type, payload, !offline)?;

    match ctx.format {
        OutputFormat::Json => {
            let data = match &submission {
                Submission::Sent => serde_json::json!({"status": "sent", "type": queue_type}),
                Submission::Queued { item, reason } => serde_json::json!({
                    "status": "queued",
                    "type": queue_type,
                    "id": item.id,
                    "reason": reason_text(reason),
                }),
            };
            to_json(&data)
        },
        OutputFormat::Pretty => Ok(match submission {
            Submission::Sent => format!("{} {} sent", "✓".green(), queue_type.display_name()),
            Submission::Queued { item, reason } => format!(
                "{} {} queued (ID: {}): {}\n{}",
                "↻".yellow(),
                queue_type.display_name(),
                item.id.unwrap_or(0),
                reason_text(&reason),
                "It will be sent automatically once the connection is back."
                    .dimmed()
            ),
        }),
    }
}

fn reason_text(reason: &QueueReason) -> String {
    match reason {
        QueueReason::Offline => "offline".to_string(),
        QueueReason::Failed(e) => e.to_string(),
    }
}

/// Remove every queued operation.
///
/// # Errors
///
/// Returns [`QueueError::Config`] without `--force`, or an error if the
/// delete fails.
pub fn clear(ctx: &Context, force: bool) -> Result<String, QueueError> {
    if !force {
        return Err(QueueError::Config(
            "Use --force to clear all operations".to_string(),
        ));
    }

    let removed = ctx.open_queue()?.clear()?;

    match ctx.format {
        OutputFormat::Json => to_json(&serde_json::json!({"cleared": removed})),
        OutputFormat::Pretty => Ok(format!("Cleared {removed} operations from queue")),
    }
}
