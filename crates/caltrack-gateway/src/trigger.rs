//! Consumes scheduler firings and runs the reminder dispatcher.

use std::sync::Arc;

use caltrack_reminders::{DispatchSummary, Dispatcher};
use caltrack_scheduler::Trigger;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Run one dispatch per trigger until the engine side closes.
///
/// Firings that queued up while a dispatch was running are discarded, so a
/// slow run is never followed by an immediate repeat. Returns the summaries
/// of the runs that completed.
pub async fn consume_triggers(
    mut fired_rx: mpsc::Receiver<Trigger>,
    dispatcher: Arc<Dispatcher>,
) -> Vec<DispatchSummary> {
    let mut completed = Vec::new();
    while let Some(trigger) = fired_rx.recv().await {
        match dispatcher.dispatch_due().await {
            Ok(summary) => {
                info!(
                    run = trigger.run,
                    sent = summary.sent,
                    failed = summary.failed,
                    "scheduled reminder run complete"
                );
                completed.push(summary);
            }
            Err(e) => warn!(run = trigger.run, error = %e, "scheduled reminder run aborted"),
        }
        while let Ok(stale) = fired_rx.try_recv() {
            warn!(run = stale.run, "firing arrived during a dispatch, skipped");
        }
    }
    completed
}
