use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use account_cell::router::account_routes;
use account_cell::AccountState;
use appointment_cell::router::{appointment_routes, audit_routes};
use appointment_cell::SchedulingState;

pub fn create_router(scheduling: Arc<SchedulingState>, accounts: Arc<AccountState>) -> Router {
    Router::new()
        .route("/", get(|| async { "MedLink scheduling API is running!" }))
        .nest("/appointments", appointment_routes(scheduling.clone()))
        .nest("/audit", audit_routes(scheduling))
        .nest("/accounts", account_routes(accounts))
}
