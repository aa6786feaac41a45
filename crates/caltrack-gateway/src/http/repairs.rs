use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use caltrack_registry::{NewRepair, Repair, RepairListing, RepairQuery};
use caltrack_users::Access;
use std::sync::Arc;
use tracing::info;

use crate::app::AppState;
use crate::http::error::{ApiError, ApiResult};
use crate::http::guard::require;

/// GET /api/repairs?search=&status=: newest start date first.
pub async fn list(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<RepairQuery>,
) -> ApiResult<Json<Vec<RepairListing>>> {
    require(&state, &headers, Access::Authenticated)?;
    Ok(Json(state.registry.list_repairs(&query)?))
}

pub async fn show(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<Json<Repair>> {
    require(&state, &headers, Access::Authenticated)?;
    state
        .registry
        .get_repair(id)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("repair", id))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(new): Json<NewRepair>,
) -> ApiResult<(StatusCode, Json<Repair>)> {
    let ctx = require(&state, &headers, Access::Authenticated)?;
    let repair = state.registry.create_repair(&new, state.clock.today())?;
    info!(repair_id = repair.id, instrument_id = repair.instrument_id, by = %ctx.username, "repair logged");
    Ok((StatusCode::CREATED, Json(repair)))
}

/// POST /api/repairs/{id}/complete: closes the repair and returns an
/// instrument under repair to active service.
pub async fn complete(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<Json<Repair>> {
    let ctx = require(&state, &headers, Access::Authenticated)?;
    let repair = state.registry.complete_repair(id, state.clock.today())?;
    info!(repair_id = id, by = %ctx.username, "repair completed");
    Ok(Json(repair))
}
