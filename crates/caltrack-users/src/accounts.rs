use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;
use caltrack_core::config::{BootstrapAdmin, MIN_PASSWORD_LEN};
use caltrack_core::types::{UserId, UserRole};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::db::{row_to_user, USER_COLUMNS};
use crate::error::{Result, UserError};
use crate::types::{NewUser, User};

/// Validate and insert a self-registered account with role `user`.
pub fn register(conn: &Connection, new: &NewUser) -> Result<User> {
    create_user(conn, new, UserRole::User)
}

/// Insert an account with an explicit role. Validation matches `register`.
pub fn create_user(conn: &Connection, new: &NewUser, role: UserRole) -> Result<User> {
    let username = new.username.trim();
    let email = new.email.trim();
    if username.is_empty() {
        return Err(UserError::Validation("username is required".to_string()));
    }
    if !email.contains('@') {
        return Err(UserError::Validation(format!("invalid email: {email}")));
    }
    if new.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(UserError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if exists(conn, "username", username)? {
        return Err(UserError::AlreadyExists(format!("username {username}")));
    }
    if exists(conn, "email", email)? {
        return Err(UserError::AlreadyExists(format!("email {email}")));
    }

    let now = Utc::now().to_rfc3339();
    let user = User {
        id: UserId::new(),
        username: username.to_string(),
        email: email.to_string(),
        role,
        department: new
            .department
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string),
        created_at: now.clone(),
        updated_at: now,
    };
    let hash = hash_password(&new.password)?;
    conn.execute(
        "INSERT INTO users
            (id, username, email, password_hash, role, department, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            user.id.as_str(),
            user.username,
            user.email,
            hash,
            user.role.to_string(),
            user.department,
            user.created_at,
            user.updated_at,
        ],
    )?;
    info!(user_id = %user.id, username = %user.username, role = %user.role, "user created");
    Ok(user)
}

/// Check credentials. Unknown user and wrong password both yield `None`.
pub fn authenticate(conn: &Connection, username: &str, password: &str) -> Result<Option<User>> {
    let found = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE username = ?1"),
            params![username.trim()],
            |row| Ok((row_to_user(row)?, row.get::<_, String>(7)?)),
        )
        .optional()?;

    let Some((user, hash)) = found else {
        debug!(username, "login for unknown user");
        return Ok(None);
    };
    if verify_password(password, &hash) {
        Ok(Some(user))
    } else {
        debug!(username, "login with wrong password");
        Ok(None)
    }
}

pub fn get_user(conn: &Connection, user_id: &str) -> Result<Option<User>> {
    Ok(conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![user_id],
            row_to_user,
        )
        .optional()?)
}

pub fn count_admins(conn: &Connection) -> Result<u64> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE role = 'admin'",
        [],
        |row| row.get(0),
    )?;
    Ok(n as u64)
}

/// Create the configured admin account unless an admin already exists.
/// Returns the new account when one was created.
pub fn ensure_bootstrap_admin(conn: &Connection, admin: &BootstrapAdmin) -> Result<Option<User>> {
    if count_admins(conn)? > 0 {
        return Ok(None);
    }
    let new = NewUser {
        username: admin.username.clone(),
        email: admin.email.clone(),
        password: admin.password.clone(),
        department: admin.department.clone(),
    };
    let user = create_user(conn, &new, UserRole::Admin)?;
    tracing::warn!(username = %user.username, "bootstrap admin created, change its password");
    Ok(Some(user))
}

// ── private helpers ───────────────────────────────────────────────────────────

fn exists(conn: &Connection, column: &str, value: &str) -> Result<bool> {
    let n: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM users WHERE {column} = ?1"),
        params![value],
        |row| row.get(0),
    )?;
    Ok(n > 0)
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| UserError::PasswordHash(e.to_string()))
}

fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "stored password hash is unreadable");
            false
        }
    }
}
