use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use caltrack_core::FixedClock;
use caltrack_notify::{EmailMessage, Notifier};
use caltrack_registry::{
    InstrumentWithDepartment, NewDepartment, NewInstrument, NewReminder, Registry, RegistryError,
    Reminder,
};
use caltrack_reminders::{DispatchError, Dispatcher, ReminderStore};
use chrono::NaiveDate;

/// Records every message; fails for addresses in `fail_for`.
#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<EmailMessage>>,
    fail_for: Vec<String>,
}

impl RecordingNotifier {
    fn failing_for(addr: &str) -> Self {
        Self {
            fail_for: vec![addr.to_string()],
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, msg: &EmailMessage) -> bool {
        self.sent.lock().unwrap().push(msg.clone());
        !self.fail_for.contains(&msg.to)
    }
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

const TODAY: (i32, u32, u32) = (2024, 3, 20);

fn today() -> NaiveDate {
    d(TODAY.0, TODAY.1, TODAY.2)
}

fn add_department(reg: &Registry, name: &str, email: Option<&str>) -> i64 {
    reg.create_department(&NewDepartment {
        name: name.to_string(),
        manager_email: email.map(str::to_string),
        description: None,
    })
    .unwrap()
    .id
}

/// Add a 90-day instrument calibrated on `last`.
fn add_instrument(reg: &Registry, name: &str, last: NaiveDate, dept: Option<i64>) -> i64 {
    reg.create_instrument(&NewInstrument {
        name: name.to_string(),
        manufacturer: Some("Fluke".to_string()),
        department_id: dept,
        last_calibration_date: last,
        calibration_frequency: 90,
        ..NewInstrument::default()
    })
    .unwrap()
    .id
}

fn dispatcher(reg: Arc<Registry>, notifier: Arc<RecordingNotifier>) -> Dispatcher {
    Dispatcher::new(reg, notifier, Arc::new(FixedClock::on(today())))
}

#[tokio::test]
async fn sends_only_to_eligible_instruments_with_a_manager() {
    let reg = Arc::new(Registry::open_in_memory().unwrap());
    let lab = add_department(&reg, "Lab", Some("lab@x.io"));
    // due 2024-03-31: upcoming, has manager
    let upcoming = add_instrument(&reg, "upcoming", d(2024, 1, 1), Some(lab));
    // due 2024-06-18: current
    add_instrument(&reg, "current", d(2024, 3, 20), Some(lab));
    // due 2024-03-05: overdue, no department
    add_instrument(&reg, "overdue", d(2023, 12, 6), None);

    let notifier = Arc::new(RecordingNotifier::default());
    let summary = dispatcher(reg.clone(), notifier.clone())
        .dispatch_reminders(today())
        .await
        .unwrap();

    assert_eq!(summary.sent, 1);
    assert_eq!(summary.eligible, 1);
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.failed, 0);

    let calls = notifier.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].to, "lab@x.io");
    assert_eq!(calls[0].subject, "Calibration Reminder: upcoming");
    assert!(calls[0].html_body.contains("<strong>Days:</strong> 11"));

    let reminders = reg.reminders_for_instrument(upcoming).unwrap();
    assert_eq!(reminders.len(), 1);
    assert_eq!(reminders[0].reminder_date, today());
    assert!(reminders[0].email_sent);
    assert!(reminders[0].sent_at.is_some());
    assert_eq!(reg.recent_reminders(10).unwrap().len(), 1);
}

#[tokio::test]
async fn notifier_failure_skips_record_and_batch_continues() {
    let reg = Arc::new(Registry::open_in_memory().unwrap());
    let broken = add_department(&reg, "Broken", Some("bounce@x.io"));
    let fine = add_department(&reg, "Fine", Some("ok@x.io"));
    // Oldest first so the failing one is attempted before the good one.
    let failed = add_instrument(&reg, "first", d(2023, 11, 1), Some(broken));
    let delivered = add_instrument(&reg, "second", d(2023, 12, 1), Some(fine));

    let notifier = Arc::new(RecordingNotifier::failing_for("bounce@x.io"));
    let summary = dispatcher(reg.clone(), notifier.clone())
        .dispatch_reminders(today())
        .await
        .unwrap();

    assert_eq!(notifier.calls().len(), 2);
    assert_eq!(summary.sent, 1);
    assert_eq!(summary.failed, 1);
    assert!(reg.reminders_for_instrument(failed).unwrap().is_empty());
    assert_eq!(reg.reminders_for_instrument(delivered).unwrap().len(), 1);
}

#[tokio::test]
async fn blank_manager_email_is_not_eligible() {
    let reg = Arc::new(Registry::open_in_memory().unwrap());
    let dept = add_department(&reg, "Quiet", None);
    add_instrument(&reg, "overdue", d(2023, 1, 1), Some(dept));

    let notifier = Arc::new(RecordingNotifier::default());
    let summary = dispatcher(reg, notifier.clone())
        .dispatch_reminders(today())
        .await
        .unwrap();
    assert_eq!(summary.sent, 0);
    assert_eq!(summary.skipped, 1);
    assert!(notifier.calls().is_empty());
}

#[tokio::test]
async fn repeated_runs_send_again_by_default() {
    let reg = Arc::new(Registry::open_in_memory().unwrap());
    let lab = add_department(&reg, "Lab", Some("lab@x.io"));
    let id = add_instrument(&reg, "scope", d(2024, 1, 1), Some(lab));

    let notifier = Arc::new(RecordingNotifier::default());
    let dispatcher = dispatcher(reg.clone(), notifier.clone());
    dispatcher.dispatch_reminders(today()).await.unwrap();
    dispatcher.dispatch_reminders(today()).await.unwrap();

    assert_eq!(notifier.calls().len(), 2);
    assert_eq!(reg.reminders_for_instrument(id).unwrap().len(), 2);
}

#[tokio::test]
async fn same_day_dedup_suppresses_second_send() {
    let reg = Arc::new(Registry::open_in_memory().unwrap());
    let lab = add_department(&reg, "Lab", Some("lab@x.io"));
    let id = add_instrument(&reg, "scope", d(2024, 1, 1), Some(lab));

    let notifier = Arc::new(RecordingNotifier::default());
    let dispatcher = dispatcher(reg.clone(), notifier.clone()).deduplicate_same_day(true);

    let first = dispatcher.dispatch_reminders(today()).await.unwrap();
    let second = dispatcher.dispatch_reminders(today()).await.unwrap();
    assert_eq!(first.sent, 1);
    assert_eq!(second.sent, 0);
    assert_eq!(second.skipped, 1);

    // A new day is a new reminder.
    let next = dispatcher.dispatch_reminders(d(2024, 3, 21)).await.unwrap();
    assert_eq!(next.sent, 1);
    assert_eq!(notifier.calls().len(), 2);
    assert_eq!(reg.reminders_for_instrument(id).unwrap().len(), 2);
}

#[tokio::test]
async fn dispatch_due_uses_the_clock_date() {
    let reg = Arc::new(Registry::open_in_memory().unwrap());
    let lab = add_department(&reg, "Lab", Some("lab@x.io"));
    let id = add_instrument(&reg, "scope", d(2024, 1, 1), Some(lab));

    let notifier = Arc::new(RecordingNotifier::default());
    let summary = dispatcher(reg.clone(), notifier).dispatch_due().await.unwrap();
    assert_eq!(summary.sent, 1);
    assert_eq!(
        reg.reminders_for_instrument(id).unwrap()[0].reminder_date,
        today()
    );
}

/// Wraps a registry and refuses reminder writes after `allow` of them.
struct FlakyStore {
    inner: Registry,
    allow: usize,
    written: Mutex<usize>,
}

impl ReminderStore for FlakyStore {
    fn load_instruments(&self) -> caltrack_registry::Result<Vec<InstrumentWithDepartment>> {
        self.inner.list_with_departments()
    }

    fn record_reminder(&self, new: &NewReminder) -> caltrack_registry::Result<Reminder> {
        let mut written = self.written.lock().unwrap();
        if *written >= self.allow {
            return Err(RegistryError::Database(rusqlite::Error::InvalidQuery));
        }
        *written += 1;
        self.inner.insert_reminder(new)
    }

    fn reminder_sent_on(&self, instrument_id: i64, date: NaiveDate) -> caltrack_registry::Result<bool> {
        self.inner.reminder_sent_on(instrument_id, date)
    }
}

#[tokio::test]
async fn record_failure_aborts_and_reports_progress() {
    let reg = Registry::open_in_memory().unwrap();
    let lab = add_department(&reg, "Lab", Some("lab@x.io"));
    let first = add_instrument(&reg, "a", d(2023, 11, 1), Some(lab));
    let second = add_instrument(&reg, "b", d(2023, 12, 1), Some(lab));
    add_instrument(&reg, "c", d(2024, 1, 1), Some(lab));

    let store = Arc::new(FlakyStore {
        inner: reg,
        allow: 1,
        written: Mutex::new(0),
    });
    let notifier = Arc::new(RecordingNotifier::default());
    let dispatcher = Dispatcher::new(
        store.clone(),
        notifier.clone(),
        Arc::new(FixedClock::on(today())),
    );

    let err = dispatcher.dispatch_reminders(today()).await.unwrap_err();
    match err {
        DispatchError::Store {
            instrument_id,
            sent_before_failure,
            ..
        } => {
            assert_eq!(instrument_id, second);
            assert_eq!(sent_before_failure, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
    // The third instrument is never attempted.
    assert_eq!(notifier.calls().len(), 2);
    assert_eq!(store.inner.reminders_for_instrument(first).unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_calibration_state_is_never_dispatched() {
    let conn = rusqlite::Connection::open_in_memory().unwrap();
    conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
    caltrack_registry::db::init_db(&conn).unwrap();
    conn.execute(
        "INSERT INTO departments (id, name, manager_email, created_at)
         VALUES (1, 'Lab', 'lab@x.io', 'x')",
        [],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO instruments
            (name, department_id, last_calibration_date, calibration_frequency,
             status, created_at, updated_at)
         VALUES ('legacy', 1, 'last tuesday', 30, 'active', 'x', 'x')",
        [],
    )
    .unwrap();
    let reg = Arc::new(Registry::new(conn).unwrap());

    let notifier = Arc::new(RecordingNotifier::default());
    let summary = dispatcher(reg.clone(), notifier.clone())
        .dispatch_reminders(today())
        .await
        .unwrap();

    assert_eq!(summary.sent, 0);
    assert_eq!(summary.eligible, 0);
    assert_eq!(summary.skipped, 1);
    assert!(notifier.calls().is_empty());
    assert!(reg.recent_reminders(10).unwrap().is_empty());
}
