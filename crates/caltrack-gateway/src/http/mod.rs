pub mod auth;
pub mod dashboard;
pub mod departments;
pub mod error;
pub mod guard;
pub mod health;
pub mod instruments;
pub mod reminders;
pub mod repairs;
pub mod reports;
