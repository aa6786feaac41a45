pub mod db;
pub mod error;
pub mod manager;
pub mod types;

pub use error::SessionError;
pub use manager::SessionManager;
pub use types::Session;
