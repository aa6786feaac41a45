use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use caltrack_registry::Reminder;
use caltrack_reminders::DispatchSummary;
use caltrack_users::Access;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::app::AppState;
use crate::http::error::{ApiError, ApiResult};
use crate::http::guard::require;

const DEFAULT_RECENT_LIMIT: usize = 50;
const MAX_RECENT_LIMIT: usize = 500;

#[derive(Deserialize)]
pub struct RecentQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

/// POST /api/reminders/send: run the dispatcher now. Admin only.
pub async fn send(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<DispatchSummary>> {
    let ctx = require(&state, &headers, Access::Admin)?;
    info!(by = %ctx.username, "manual reminder dispatch");
    let summary = state.dispatcher.dispatch_reminders(state.clock.today()).await?;
    Ok(Json(summary))
}

/// GET /api/reminders?limit=: most recent delivered reminders.
pub async fn recent(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<RecentQuery>,
) -> ApiResult<Json<Vec<Reminder>>> {
    require(&state, &headers, Access::Authenticated)?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_RECENT_LIMIT)
        .min(MAX_RECENT_LIMIT);
    Ok(Json(state.registry.recent_reminders(limit)?))
}

/// GET /api/instruments/{id}/reminders
pub async fn for_instrument(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<Reminder>>> {
    require(&state, &headers, Access::Authenticated)?;
    if state.registry.get_instrument(id)?.is_none() {
        return Err(ApiError::not_found("instrument", id));
    }
    Ok(Json(state.registry.reminders_for_instrument(id)?))
}
