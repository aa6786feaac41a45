use caltrack_registry::{
    InstrumentWithDepartment, NewReminder, Registry, Reminder, Result as RegistryResult,
};
use chrono::NaiveDate;

/// The slice of the registry the dispatcher reads and writes.
///
/// Implementations must return from each call before the dispatcher awaits
/// the notifier; no lock is held across a send.
pub trait ReminderStore: Send + Sync {
    fn load_instruments(&self) -> RegistryResult<Vec<InstrumentWithDepartment>>;

    fn record_reminder(&self, new: &NewReminder) -> RegistryResult<Reminder>;

    fn reminder_sent_on(&self, instrument_id: i64, date: NaiveDate) -> RegistryResult<bool>;
}

impl ReminderStore for Registry {
    fn load_instruments(&self) -> RegistryResult<Vec<InstrumentWithDepartment>> {
        self.list_with_departments()
    }

    fn record_reminder(&self, new: &NewReminder) -> RegistryResult<Reminder> {
        self.insert_reminder(new)
    }

    fn reminder_sent_on(&self, instrument_id: i64, date: NaiveDate) -> RegistryResult<bool> {
        Registry::reminder_sent_on(self, instrument_id, date)
    }
}
