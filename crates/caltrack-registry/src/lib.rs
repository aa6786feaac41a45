//! `caltrack-registry`: SQLite store for instruments, departments, repairs
//! and reminders, plus the calibration status classifier.
//!
//! # Layout
//!
//! | Module        | Contents                                              |
//! |---------------|-------------------------------------------------------|
//! | `status`      | Pure classifier: overdue / upcoming / current / unknown |
//! | `instruments` | Instrument CRUD and calibration updates               |
//! | `departments` | Department CRUD; deletion unassigns instruments       |
//! | `repairs`     | Repair log; atomic completion transition              |
//! | `reminders`   | Append-only log of delivered reminders                |
//! | `report`      | Dashboard and report views                            |
//! | `manager`     | [`Registry`]: `Mutex<Connection>` wrapper over it all |

pub mod db;
pub mod departments;
pub mod error;
pub mod instruments;
pub mod manager;
pub mod money;
pub mod reminders;
pub mod repairs;
pub mod report;
pub mod status;
pub mod types;

pub use error::{RegistryError, Result};
pub use manager::Registry;
pub use money::Money;
pub use status::{classify, classify_raw, CalibrationState, CalibrationStatus};
pub use types::*;
