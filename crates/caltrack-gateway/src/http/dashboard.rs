use axum::{extract::State, http::HeaderMap, Json};
use caltrack_registry::report::Dashboard;
use caltrack_users::Access;
use std::sync::Arc;

use crate::app::AppState;
use crate::http::{error::ApiResult, guard::require};

/// GET /api/dashboard: every instrument with its calibration state, oldest
/// calibration first, plus summary counts.
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<Dashboard>> {
    require(&state, &headers, Access::Authenticated)?;
    Ok(Json(state.registry.dashboard(state.clock.today())?))
}
