//! Department management. Admin only.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use caltrack_registry::{Department, NewDepartment};
use caltrack_users::Access;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::app::AppState;
use crate::http::error::ApiResult;
use crate::http::guard::require;

pub async fn list(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<Department>>> {
    require(&state, &headers, Access::Admin)?;
    Ok(Json(state.registry.list_departments()?))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(new): Json<NewDepartment>,
) -> ApiResult<(StatusCode, Json<Department>)> {
    let ctx = require(&state, &headers, Access::Admin)?;
    let dept = state.registry.create_department(&new)?;
    info!(department_id = dept.id, by = %ctx.username, "department added");
    Ok((StatusCode::CREATED, Json(dept)))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(update): Json<NewDepartment>,
) -> ApiResult<Json<Department>> {
    require(&state, &headers, Access::Admin)?;
    Ok(Json(state.registry.update_department(id, &update)?))
}

/// DELETE /api/departments/{id}: instruments in the department are kept
/// and left unassigned.
pub async fn remove(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let ctx = require(&state, &headers, Access::Admin)?;
    let unassigned = state.registry.delete_department(id)?;
    info!(department_id = id, unassigned, by = %ctx.username, "department deleted");
    Ok(Json(json!({
        "deleted": id,
        "unassigned_instruments": unassigned,
    })))
}
