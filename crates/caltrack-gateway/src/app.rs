use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use caltrack_core::config::CaltrackConfig;
use caltrack_core::Clock;
use caltrack_registry::Registry;
use caltrack_reminders::Dispatcher;
use caltrack_sessions::SessionManager;
use caltrack_users::UserManager;

use crate::http;

/// Central shared state, passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: CaltrackConfig,
    pub registry: Arc<Registry>,
    pub users: UserManager,
    pub sessions: SessionManager,
    /// Shared with the scheduler trigger task.
    pub dispatcher: Arc<Dispatcher>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(
        config: CaltrackConfig,
        registry: Arc<Registry>,
        users: UserManager,
        sessions: SessionManager,
        dispatcher: Arc<Dispatcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            registry,
            users,
            sessions,
            dispatcher,
            clock,
        }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(http::health::health_handler))
        .route("/api/auth/login", post(http::auth::login))
        .route("/api/auth/logout", post(http::auth::logout))
        .route("/api/auth/register", post(http::auth::register))
        .route("/api/dashboard", get(http::dashboard::dashboard))
        .route(
            "/api/instruments",
            get(http::instruments::list).post(http::instruments::create),
        )
        .route(
            "/api/instruments/{id}",
            get(http::instruments::show)
                .put(http::instruments::update)
                .delete(http::instruments::remove),
        )
        .route(
            "/api/instruments/{id}/calibrate",
            post(http::instruments::calibrate),
        )
        .route("/api/instruments/{id}/status", put(http::instruments::set_status))
        .route(
            "/api/instruments/{id}/reminders",
            get(http::reminders::for_instrument),
        )
        .route(
            "/api/repairs",
            get(http::repairs::list).post(http::repairs::create),
        )
        .route("/api/repairs/{id}", get(http::repairs::show))
        .route("/api/repairs/{id}/complete", post(http::repairs::complete))
        .route(
            "/api/departments",
            get(http::departments::list).post(http::departments::create),
        )
        .route(
            "/api/departments/{id}",
            put(http::departments::update).delete(http::departments::remove),
        )
        .route("/api/reminders", get(http::reminders::recent))
        .route("/api/reminders/send", post(http::reminders::send))
        .route("/api/reports", get(http::reports::calibration_report))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
