use std::sync::{Mutex, MutexGuard, PoisonError};

use caltrack_core::config::BootstrapAdmin;
use rusqlite::Connection;
use tracing::instrument;

use crate::accounts;
use crate::error::Result;
use crate::types::{NewUser, User};

/// Thread-safe account store over its own SQLite connection.
pub struct UserManager {
    db: Mutex<Connection>,
}

impl UserManager {
    pub fn new(conn: Connection) -> Result<Self> {
        crate::db::init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[instrument(skip(self, new), fields(username = %new.username))]
    pub fn register(&self, new: &NewUser) -> Result<User> {
        accounts::register(&self.conn(), new)
    }

    #[instrument(skip(self, password))]
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Option<User>> {
        accounts::authenticate(&self.conn(), username, password)
    }

    pub fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        accounts::get_user(&self.conn(), user_id)
    }

    pub fn ensure_bootstrap_admin(&self, admin: &BootstrapAdmin) -> Result<Option<User>> {
        accounts::ensure_bootstrap_admin(&self.conn(), admin)
    }
}
