//! Calibration reminder dispatch: classify every instrument, email the
//! department manager for the ones needing attention, and log each delivery.

pub mod dispatch;
pub mod message;
pub mod store;

pub use dispatch::{DispatchError, DispatchSummary, Dispatcher};
pub use message::reminder_message;
pub use store::ReminderStore;
