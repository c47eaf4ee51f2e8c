use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::{actor_middleware, auth_middleware};

use crate::handlers::*;
use crate::state::AccountState;

pub fn account_routes(state: Arc<AccountState>) -> Router {
    Router::new()
        .route("/", post(create_account))
        .route("/logs", get(list_admin_log))
        .layer(middleware::from_fn_with_state(state.directory.clone(), actor_middleware))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}
