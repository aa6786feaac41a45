use axum::{extract::State, http::HeaderMap, Json};
use caltrack_registry::report::ReportRow;
use caltrack_users::Access;
use std::sync::Arc;

use crate::app::AppState;
use crate::http::{error::ApiResult, guard::require};

/// GET /api/reports: calibration schedule with next due dates.
pub async fn calibration_report(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<ReportRow>>> {
    require(&state, &headers, Access::Authenticated)?;
    Ok(Json(state.registry.calibration_report(state.clock.today())?))
}
