use caltrack_core::types::Schedule;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::error::Result;
use crate::schedule::{compute_next_run, validate};

/// One firing of the schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub fired_at: DateTime<Utc>,
    /// 1-based count of firings since the engine started.
    pub run: u64,
}

/// Sleeps until each scheduled instant and announces it on `fired_tx`.
pub struct SchedulerEngine {
    schedule: Schedule,
    fired_tx: mpsc::Sender<Trigger>,
}

impl SchedulerEngine {
    pub fn new(schedule: Schedule, fired_tx: mpsc::Sender<Trigger>) -> Result<Self> {
        validate(&schedule)?;
        Ok(Self { schedule, fired_tx })
    }

    /// Main loop. Returns when `shutdown` broadcasts `true`, the schedule is
    /// exhausted, or the receiving side has gone away.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(schedule = ?self.schedule, "scheduler engine started");
        let mut run = 0u64;

        loop {
            let now = Utc::now();
            let Some(next) = compute_next_run(&self.schedule, now) else {
                info!("schedule exhausted, scheduler engine stopping");
                break;
            };
            let wait = (next - now).to_std().unwrap_or_default();

            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    run += 1;
                    let trigger = Trigger { fired_at: Utc::now(), run };
                    info!(run, "schedule fired");
                    // try_send never blocks the loop; a busy receiver means a
                    // dispatch is still running and this firing is dropped.
                    match self.fired_tx.try_send(trigger) {
                        Ok(()) => {}
                        Err(mpsc::error::TrySendError::Full(_)) => {
                            warn!(run, "trigger channel full, firing dropped");
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => {
                            info!("trigger receiver closed, scheduler engine stopping");
                            break;
                        }
                    }
                }
                changed = shutdown.changed() => {
                    // A dropped sender counts as shutdown.
                    if changed.is_err() || *shutdown.borrow() {
                        info!("scheduler engine shutting down");
                        break;
                    }
                }
            }
        }
    }
}
