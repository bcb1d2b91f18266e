//! Background coordinator commands.

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::Context;
use crate::cli::args::OutputFormat;
use crate::coordinator::{spawn_watcher, Coordinator, Trigger, TriggerSink};
use crate::error::QueueError;
use crate::output::{format_reports, to_json};
use crate::queue::{OfflineQueue, QueueType};
use crate::replay::Transport;

fn coordinator(ctx: &Context) -> Result<Coordinator, QueueError> {
    let transport: Arc<dyn Transport> = Arc::new(ctx.transport()?);
    Ok(Coordinator::new(&ctx.db_path, transport).with_policy(ctx.policy()))
}

/// Handle one sync event in the foreground.
///
/// Tags that do not name a known type are ignored and produce no reports.
///
/// # Errors
///
/// Returns an error if the store cannot be opened.
pub fn trigger(ctx: &Context, tag: &str) -> Result<String, QueueError> {
    let reports = coordinator(ctx)?.handle(&Trigger::Sync {
        tag: tag.to_string(),
    })?;
    format_reports(&reports, ctx.format)
}

/// Handle one push notification body in the foreground.
///
/// # Errors
///
/// Returns an error if the store cannot be opened.
pub fn push(ctx: &Context, body: &str) -> Result<String, QueueError> {
    let reports = coordinator(ctx)?.handle(&Trigger::Push {
        body: body.to_string(),
    })?;
    format_reports(&reports, ctx.format)
}

/// Hand one stdin trigger to the coordinator. Returns false once it is gone.
fn forward(queue: &OfflineQueue, handle: &impl TriggerSink, trigger: Trigger) -> bool {
    match trigger {
        Trigger::DrainAll => queue.request_drain_all(),
        Trigger::Message { queue: name } => match name.parse::<QueueType>() {
            Ok(queue_type) => queue.request_drain(queue_type),
            // Unknown names are still forwarded; the coordinator ignores them
            Err(_) => handle.send(Trigger::Message { queue: name }).is_ok(),
        },
        other => handle.send(other).is_ok(),
    }
}

/// Run the coordinator until stdin closes.
///
/// Each stdin line is a JSON [`Trigger`]. Drain requests go through the
/// queue API like any foreground caller; other triggers are forwarded to the
/// coordinator as-is. Lines that do not parse are logged and skipped.
///
/// # Errors
///
/// Returns an error if a thread cannot be spawned or stdin cannot be read.
pub fn worker(ctx: &Context, no_watch: bool) -> Result<String, QueueError> {
    let transport: Arc<dyn Transport> = Arc::new(ctx.transport()?);
    let (handle, join) = Coordinator::new(&ctx.db_path, Arc::clone(&transport))
        .with_policy(ctx.policy())
        .spawn()?;

    let sink: Arc<dyn TriggerSink> = Arc::new(handle.clone());
    let foreground = ctx.open_queue()?.with_sink(Arc::clone(&sink));

    let stop = Arc::new(AtomicBool::new(false));
    let poll_secs = ctx.config.worker.health_poll_secs;
    let watcher = if no_watch || poll_secs == 0 {
        None
    } else {
        Some(spawn_watcher(
            transport,
            ctx.config.network.health_path.clone(),
            Duration::from_secs(poll_secs),
            ctx.open_queue()?.with_sink(sink),
            Arc::clone(&stop),
        )?)
    };

    let mut accepted = 0_usize;
    let mut rejected = 0_usize;

    for line in std::io::stdin().lock().lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<Trigger>(line) {
            Ok(Trigger::Shutdown) => break,
            Ok(trigger) => {
                if !forward(&foreground, &handle, trigger) {
                    warn!("coordinator stopped unexpectedly");
                    break;
                }
                accepted += 1;
            },
            Err(e) => {
                warn!(error = %e, "skipping malformed trigger");
                rejected += 1;
            },
        }
    }

    info!("input closed, stopping worker");
    stop.store(true, Ordering::Relaxed);
    // Already stopped is fine here
    let _ = handle.shutdown();

    if join.join().is_err() {
        warn!("coordinator thread panicked");
    }

    // The watcher exits after its current sleep and is not joined
    drop(watcher);

    match ctx.format {
        OutputFormat::Json => to_json(&serde_json::json!({
            "accepted": accepted,
            "rejected": rejected,
        })),
        OutputFormat::Pretty => Ok(format!(
            "Worker stopped ({accepted} triggers handled, {rejected} rejected)"
        )),
    }
}
