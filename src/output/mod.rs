//! Output formatting for nexora-queue.
//!
//! Commands build their result as a `String` in either format; `main`
//! prints it.

use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;

use crate::cli::args::OutputFormat;
use crate::error::QueueError;
use crate::queue::{QueueItem, QueueStats, QueueType};
use crate::replay::{format_drain_report, DrainReport};

/// Serialize any value as pretty JSON.
///
/// # Errors
///
/// Returns `QueueError::Parse` if JSON serialization fails.
pub fn to_json<T: Serialize>(value: &T) -> Result<String, QueueError> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Format pending items of one type.
///
/// # Errors
///
/// Returns `QueueError::Parse` if JSON serialization fails.
pub fn format_items(
    queue_type: QueueType,
    items: &[QueueItem],
    format: OutputFormat,
) -> Result<String, QueueError> {
    match format {
        OutputFormat::Json => to_json(&serde_json::json!({
            "type": queue_type,
            "count": items.len(),
            "items": items,
        })),
        OutputFormat::Pretty => Ok(format_items_pretty(queue_type, items)),
    }
}

fn format_items_pretty(queue_type: QueueType, items: &[QueueItem]) -> String {
    if items.is_empty() {
        return format!("{} (0 pending)\n  Nothing queued", queue_type.display_name());
    }

    let mut lines = Vec::new();
    lines.push(format!(
        "{} ({} pending)",
        queue_type.display_name().bold(),
        items.len()
    ));
    lines.push("─".repeat(60));
    lines.push(format!("{:<6} {:<20} {:<7} {}", "ID", "Queued", "Retry", "Payload"));
    lines.push("─".repeat(60));

    for item in items {
        let id = item.id.map(|i| i.to_string()).unwrap_or_default();
        let created = item.created_at.format("%Y-%m-%d %H:%M").to_string();
        let retry = if item.retry > 0 {
            item.retry.to_string().yellow().to_string()
        } else {
            "0".dimmed().to_string()
        };

        lines.push(format!(
            "{:<6} {:<20} {:<7} {}",
            id,
            created,
            retry,
            truncate(&item.payload.to_string(), 40).dimmed()
        ));

        if let Some(error) = &item.last_error {
            lines.push(format!("       {}", truncate(error, 50).red()));
        }
    }

    lines.join("\n")
}

/// Format queue statistics.
///
/// # Errors
///
/// Returns `QueueError::Parse` if JSON serialization fails.
pub fn format_stats(stats: &QueueStats, format: OutputFormat) -> Result<String, QueueError> {
    match format {
        OutputFormat::Json => {
            let by_type: serde_json::Map<String, serde_json::Value> = stats
                .by_type
                .iter()
                .map(|(queue_type, count)| (queue_type.to_string(), (*count).into()))
                .collect();
            to_json(&serde_json::json!({
                "pending": stats.pending,
                "by_type": by_type,
                "oldest_pending": stats.oldest_pending.map(|t| t.to_rfc3339()),
            }))
        },
        OutputFormat::Pretty => Ok(format_stats_pretty(stats)),
    }
}

fn format_stats_pretty(stats: &QueueStats) -> String {
    let mut lines = Vec::new();

    lines.push("Offline Queue Status".bold().to_string());
    lines.push("─".repeat(40));
    lines.push(format!(
        "  Pending:    {} {}",
        stats.pending,
        if stats.pending > 0 {
            "operations waiting".dimmed()
        } else {
            "".dimmed()
        }
    ));

    for (queue_type, count) in &stats.by_type {
        lines.push(format!("    {:<24} {}", queue_type.display_name(), count));
    }

    if let Some(oldest) = stats.oldest_pending {
        lines.push(format!("  Oldest:     {}", format_age(oldest).dimmed()));
    }

    if stats.pending > 0 {
        lines.push(String::new());
        lines.push(
            "Run 'nexora-queue drain --all' to replay pending operations"
                .dimmed()
                .to_string(),
        );
    }

    lines.join("\n")
}

/// Format the reports of one or more drain passes.
///
/// # Errors
///
/// Returns `QueueError::Parse` if JSON serialization fails.
pub fn format_reports(reports: &[DrainReport], format: OutputFormat) -> Result<String, QueueError> {
    match format {
        OutputFormat::Json => to_json(&reports),
        OutputFormat::Pretty => {
            let non_empty: Vec<_> = reports.iter().filter(|r| r.total() > 0).collect();
            if non_empty.is_empty() {
                return Ok("No pending operations to replay.".to_string());
            }
            Ok(non_empty
                .into_iter()
                .map(format_drain_report)
                .collect::<Vec<_>>()
                .join("\n\n"))
        },
    }
}

fn format_age(at: DateTime<Utc>) -> String {
    let age = Utc::now().signed_duration_since(at);
    if age.num_hours() > 0 {
        format!("{} hours ago", age.num_hours())
    } else if age.num_minutes() > 0 {
        format!("{} minutes ago", age.num_minutes())
    } else {
        "just now".to_string()
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{head}...")
    } else {
        s.to_string()
    }
}
