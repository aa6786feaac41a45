use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use crate::db::clean;
use crate::error::{RegistryError, Result};
use crate::types::{Department, NewDepartment};

pub(crate) const DEPARTMENT_COLUMNS: &str = "id, name, manager_email, description, created_at";

/// Map a SELECT row (columns from DEPARTMENT_COLUMNS, starting at `base`).
pub(crate) fn row_to_department(row: &rusqlite::Row<'_>, base: usize) -> rusqlite::Result<Department> {
    Ok(Department {
        id: row.get(base)?,
        name: row.get(base + 1)?,
        manager_email: row.get(base + 2)?,
        description: row.get(base + 3)?,
        created_at: row.get(base + 4)?,
    })
}

pub fn list_departments(conn: &Connection) -> Result<Vec<Department>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DEPARTMENT_COLUMNS} FROM departments ORDER BY name"
    ))?;
    let rows = stmt.query_map([], |row| row_to_department(row, 0))?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Returns None instead of an error when absent.
pub fn get_department(conn: &Connection, id: i64) -> Result<Option<Department>> {
    Ok(conn
        .query_row(
            &format!("SELECT {DEPARTMENT_COLUMNS} FROM departments WHERE id = ?1"),
            params![id],
            |row| row_to_department(row, 0),
        )
        .optional()?)
}

pub fn create_department(conn: &Connection, new: &NewDepartment) -> Result<Department> {
    let name = validate(new)?;
    ensure_name_free(conn, &name, None)?;

    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO departments (name, manager_email, description, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![name, clean(&new.manager_email), clean(&new.description), now],
    )?;
    let id = conn.last_insert_rowid();
    info!(department_id = id, %name, "department created");
    get_department(conn, id)?.ok_or_else(|| RegistryError::not_found("department", id))
}

pub fn update_department(conn: &Connection, id: i64, update: &NewDepartment) -> Result<Department> {
    let name = validate(update)?;
    ensure_name_free(conn, &name, Some(id))?;

    let n = conn.execute(
        "UPDATE departments SET name = ?2, manager_email = ?3, description = ?4 WHERE id = ?1",
        params![
            id,
            name,
            clean(&update.manager_email),
            clean(&update.description)
        ],
    )?;
    if n == 0 {
        return Err(RegistryError::not_found("department", id));
    }
    info!(department_id = id, "department updated");
    get_department(conn, id)?.ok_or_else(|| RegistryError::not_found("department", id))
}

/// Delete a department, unassigning its instruments first.
///
/// Instruments are never deleted here; their `department_id` becomes NULL.
/// Both steps commit together. Returns how many instruments were unassigned.
pub fn delete_department(conn: &Connection, id: i64) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let unassigned = tx.execute(
        "UPDATE instruments SET department_id = NULL, updated_at = ?2 WHERE department_id = ?1",
        params![id, Utc::now().to_rfc3339()],
    )?;
    let n = tx.execute("DELETE FROM departments WHERE id = ?1", params![id])?;
    if n == 0 {
        // Dropping `tx` rolls back the (empty) unassignment.
        return Err(RegistryError::not_found("department", id));
    }
    tx.commit()?;
    info!(department_id = id, unassigned, "department deleted");
    Ok(unassigned)
}

fn validate(new: &NewDepartment) -> Result<String> {
    let name = new.name.trim();
    if name.is_empty() {
        return Err(RegistryError::Validation("department name is required".to_string()));
    }
    if let Some(email) = clean(&new.manager_email) {
        if !email.contains('@') {
            return Err(RegistryError::Validation(format!(
                "manager email is not an address: {email}"
            )));
        }
    }
    Ok(name.to_string())
}

fn ensure_name_free(conn: &Connection, name: &str, except: Option<i64>) -> Result<()> {
    let taken: Option<i64> = conn
        .query_row(
            "SELECT id FROM departments WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?;
    match taken {
        Some(other) if Some(other) != except => Err(RegistryError::Conflict(format!(
            "department name already exists: {name}"
        ))),
        _ => Ok(()),
    }
}
