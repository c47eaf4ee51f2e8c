// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post, put},
    Router,
};

use shared_utils::extractor::{actor_middleware, auth_middleware};

use crate::handlers;
use crate::state::SchedulingState;

pub fn appointment_routes(state: Arc<SchedulingState>) -> Router {
    // Every appointment operation needs an authenticated, resolved actor
    let protected_routes = Router::new()
        .route("/", post(handlers::create_appointment).get(handlers::list_appointments))
        .route("/conflicts/check", get(handlers::check_conflicts))
        .route("/agenda", get(handlers::doctor_agenda))
        .route("/dashboard", get(handlers::clinic_dashboard))

        // Patient self-service
        .route("/me/{appointment_id}/cancel", patch(handlers::cancel_own_appointment))
        .route("/me/{appointment_id}/reschedule", patch(handlers::reschedule_own_appointment))

        .route(
            "/{appointment_id}",
            get(handlers::get_appointment).delete(handlers::delete_appointment),
        )
        .route("/{appointment_id}/status", put(handlers::update_status))
        .route("/{appointment_id}/confirm", patch(handlers::confirm_appointment))
        .route("/{appointment_id}/cancel", patch(handlers::cancel_appointment))
        .route("/{appointment_id}/reschedule", patch(handlers::reschedule_appointment))
        .route("/{appointment_id}/reschedule-request", patch(handlers::request_reschedule))
        .route("/{appointment_id}/finalize", post(handlers::finalize_appointment))
        .route("/{appointment_id}/payment", put(handlers::mark_paid))
        .route(
            "/{appointment_id}/annotation",
            get(handlers::get_annotation).post(handlers::upsert_annotation),
        )
        .route("/{appointment_id}/history", get(handlers::appointment_history))
        .layer(middleware::from_fn_with_state(state.directory.clone(), actor_middleware))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}

pub fn audit_routes(state: Arc<SchedulingState>) -> Router {
    Router::new()
        .route("/status-logs", get(handlers::search_status_logs))
        .layer(middleware::from_fn_with_state(state.directory.clone(), actor_middleware))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}
