use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use caltrack_registry::{Instrument, InstrumentStatus, InstrumentUpdate, NewInstrument};
use caltrack_users::Access;
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::app::AppState;
use crate::http::error::{ApiError, ApiResult};
use crate::http::guard::require;

#[derive(Deserialize)]
pub struct CalibrateRequest {
    /// Defaults to today.
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: InstrumentStatus,
}

/// GET /api/instruments: ordered by name.
pub async fn list(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<Instrument>>> {
    require(&state, &headers, Access::Authenticated)?;
    Ok(Json(state.registry.list_instruments()?))
}

pub async fn show(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<Json<Instrument>> {
    require(&state, &headers, Access::Authenticated)?;
    state
        .registry
        .get_instrument(id)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("instrument", id))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(new): Json<NewInstrument>,
) -> ApiResult<(StatusCode, Json<Instrument>)> {
    let ctx = require(&state, &headers, Access::Authenticated)?;
    let created = state.registry.create_instrument(&new)?;
    info!(instrument_id = created.id, by = %ctx.username, "instrument added");
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(update): Json<InstrumentUpdate>,
) -> ApiResult<Json<Instrument>> {
    require(&state, &headers, Access::Authenticated)?;
    Ok(Json(state.registry.update_instrument(id, &update)?))
}

pub async fn remove(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let ctx = require(&state, &headers, Access::Authenticated)?;
    state.registry.delete_instrument(id)?;
    info!(instrument_id = id, by = %ctx.username, "instrument deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/instruments/{id}/calibrate: record a calibration.
pub async fn calibrate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(req): Json<CalibrateRequest>,
) -> ApiResult<Json<Instrument>> {
    require(&state, &headers, Access::Authenticated)?;
    let date = req.date.unwrap_or_else(|| state.clock.today());
    state.registry.calibrate_instrument(id, date)?;
    state
        .registry
        .get_instrument(id)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("instrument", id))
}

/// PUT /api/instruments/{id}/status
pub async fn set_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(req): Json<StatusRequest>,
) -> ApiResult<Json<Instrument>> {
    require(&state, &headers, Access::Authenticated)?;
    state.registry.set_instrument_status(id, req.status)?;
    state
        .registry
        .get_instrument(id)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("instrument", id))
}
