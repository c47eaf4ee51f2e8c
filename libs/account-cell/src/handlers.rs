use std::sync::Arc;

use axum::{
    extract::{Extension, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use shared_models::actor::Actor;
use shared_models::directory::AdminLogQuery;
use shared_models::error::AppError;

use crate::models::CreateAccountRequest;
use crate::services::provisioning::AccountProvisioningService;
use crate::state::AccountState;

#[axum::debug_handler]
pub async fn create_account(
    State(state): State<Arc<AccountState>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let service = AccountProvisioningService::new(&state);
    let provisioned = service.provision(&actor, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "account": provisioned.account,
            "profile": provisioned.profile,
            "message": "Account created successfully"
        })),
    ))
}

#[axum::debug_handler]
pub async fn list_admin_log(
    State(state): State<Arc<AccountState>>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<AdminLogQuery>,
) -> Result<Json<Value>, AppError> {
    let service = AccountProvisioningService::new(&state);
    let entries = service.admin_log(&actor, query).await?;

    Ok(Json(json!({
        "logs": entries,
        "total": entries.len()
    })))
}
