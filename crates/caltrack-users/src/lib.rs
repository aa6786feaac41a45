//! Accounts, password verification and the per-request access guard.

pub mod accounts;
pub mod db;
pub mod error;
pub mod guard;
pub mod manager;
pub mod types;

pub use error::{Result, UserError};
pub use guard::{check, Access, Denied};
pub use manager::UserManager;
pub use types::{NewUser, User};
