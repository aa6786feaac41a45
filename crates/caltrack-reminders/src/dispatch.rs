use std::sync::Arc;

use caltrack_core::Clock;
use caltrack_notify::Notifier;
use caltrack_registry::{classify, NewReminder, RegistryError};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::message::reminder_message;
use crate::store::ReminderStore;

/// Outcome counts for one dispatch run.
///
/// `eligible + skipped` covers every instrument loaded; `sent + failed`
/// equals `eligible` when the run completes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    pub eligible: usize,
    /// Reminders delivered and recorded.
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("failed to load instruments: {0}")]
    Load(#[source] RegistryError),

    /// A reminder was delivered but could not be recorded. Rows written
    /// before this point stay committed.
    #[error("failed to record reminder for instrument {instrument_id} after {sent_before_failure} sent: {source}")]
    Store {
        instrument_id: i64,
        sent_before_failure: usize,
        #[source]
        source: RegistryError,
    },
}

/// Scans instruments and emails department managers about calibrations that
/// are overdue or due within the upcoming window.
pub struct Dispatcher {
    store: Arc<dyn ReminderStore>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    deduplicate_same_day: bool,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn ReminderStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            notifier,
            clock,
            deduplicate_same_day: false,
        }
    }

    /// Skip instruments that already have a reminder dated the run's `today`.
    pub fn deduplicate_same_day(mut self, enabled: bool) -> Self {
        self.deduplicate_same_day = enabled;
        self
    }

    /// Run against the clock's current date.
    pub async fn dispatch_due(&self) -> Result<DispatchSummary, DispatchError> {
        self.dispatch_reminders(self.clock.today()).await
    }

    /// Send one reminder per eligible instrument and record each delivery.
    ///
    /// A notifier failure is logged and counted; the batch continues. A
    /// failure to load instruments or to record a delivered reminder aborts
    /// the run.
    #[instrument(skip(self), fields(notifier = self.notifier.name()))]
    pub async fn dispatch_reminders(
        &self,
        today: NaiveDate,
    ) -> Result<DispatchSummary, DispatchError> {
        let instruments = self.store.load_instruments().map_err(DispatchError::Load)?;
        let mut summary = DispatchSummary::default();

        for entry in &instruments {
            let inst = &entry.instrument;
            let status = classify(inst.last_calibration_date, inst.calibration_frequency, today);
            if !status.state.needs_attention() {
                summary.skipped += 1;
                continue;
            }
            let Some(to) = entry.manager_email() else {
                debug!(instrument_id = inst.id, "no manager email, skipping");
                summary.skipped += 1;
                continue;
            };

            if self.deduplicate_same_day && self.already_sent(inst.id, today) {
                debug!(instrument_id = inst.id, "reminder already sent today");
                summary.skipped += 1;
                continue;
            }

            summary.eligible += 1;
            let msg = reminder_message(to, inst, status);
            if !self.notifier.send(&msg).await {
                warn!(instrument_id = inst.id, to, "reminder not delivered");
                summary.failed += 1;
                continue;
            }

            let record = NewReminder {
                instrument_id: inst.id,
                reminder_date: today,
                sent_at: self.clock.now(),
            };
            self.store
                .record_reminder(&record)
                .map_err(|source| DispatchError::Store {
                    instrument_id: inst.id,
                    sent_before_failure: summary.sent,
                    source,
                })?;
            summary.sent += 1;
        }

        info!(
            eligible = summary.eligible,
            sent = summary.sent,
            failed = summary.failed,
            skipped = summary.skipped,
            "reminder dispatch finished"
        );
        Ok(summary)
    }

    fn already_sent(&self, instrument_id: i64, today: NaiveDate) -> bool {
        // A failed lookup falls back to sending, matching the no-dedup default.
        match self.store.reminder_sent_on(instrument_id, today) {
            Ok(sent) => sent,
            Err(e) => {
                warn!(instrument_id, error = %e, "dedup lookup failed");
                false
            }
        }
    }
}
