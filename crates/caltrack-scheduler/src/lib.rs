//! `caltrack-scheduler`: periodic trigger for reminder dispatch.
//!
//! # Schedule variants
//!
//! | Variant    | Behaviour                                          |
//! |------------|----------------------------------------------------|
//! | `Once`     | Single fire at an absolute UTC instant             |
//! | `Interval` | Repeat every N seconds                             |
//! | `Daily`    | Fire at HH:MM UTC every day                        |
//! | `Weekly`   | Fire at HH:MM UTC on a specific weekday            |
//!
//! The engine owns no work of its own: each firing is sent as a [`Trigger`]
//! on an mpsc channel and the receiver decides what to run.

pub mod engine;
pub mod error;
pub mod schedule;

pub use caltrack_core::types::Schedule;
pub use engine::{SchedulerEngine, Trigger};
pub use error::{Result, SchedulerError};
pub use schedule::{compute_next_run, validate};
