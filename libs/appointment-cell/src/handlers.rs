// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::actor::Actor;
use shared_models::error::AppError;

use crate::models::{
    AgendaQuery, AnnotationRequest, AppointmentRecord, AppointmentSearchQuery, AppointmentView, AuditLogQuery,
    CancelAppointmentRequest, ConflictCheckQuery, CreateAppointmentRequest, FinalizeAppointmentRequest,
    RescheduleAppointmentRequest, UpdateStatusRequest,
};
use crate::services::audit::AuditLogService;
use crate::services::presenter::AppointmentPresenter;
use crate::services::scheduling::{AppointmentSchedulingService, PaymentOutcome};
use crate::state::SchedulingState;

// ==============================================================================
// BOOKING AND READS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<Arc<SchedulingState>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let service = AppointmentSchedulingService::new(&state);
    let record = service.create_appointment(&actor, request).await?;
    let appointment = present(&state, record).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "appointment": appointment,
            "message": "Appointment booked successfully"
        })),
    ))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<SchedulingState>>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<AppointmentSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentSchedulingService::new(&state);
    let records = service.list_appointments(&actor, query).await?;
    let appointments = AppointmentPresenter::new(Arc::clone(&state.directory))
        .present_all(records)
        .await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<SchedulingState>>,
    Extension(actor): Extension<Actor>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentSchedulingService::new(&state);
    let record = service.get_appointment(&actor, appointment_id).await?;

    Ok(Json(json!(present(&state, record).await?)))
}

#[axum::debug_handler]
pub async fn check_conflicts(
    State(state): State<Arc<SchedulingState>>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<ConflictCheckQuery>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentSchedulingService::new(&state);
    let report = service.check_conflicts(&actor, query).await?;

    Ok(Json(json!(report)))
}

// ==============================================================================
// STATUS TRANSITIONS
// ==============================================================================

#[axum::debug_handler]
pub async fn update_status(
    State(state): State<Arc<SchedulingState>>,
    Extension(actor): Extension<Actor>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentSchedulingService::new(&state);
    let change = service.update_status(&actor, appointment_id, request.status).await?;
    let appointment = present(&state, change.record).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "changed": change.changed,
        "message": if change.changed {
            format!("Appointment status updated to {}", request.status)
        } else {
            format!("Appointment is already {}", request.status)
        }
    })))
}

#[axum::debug_handler]
pub async fn confirm_appointment(
    State(state): State<Arc<SchedulingState>>,
    Extension(actor): Extension<Actor>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentSchedulingService::new(&state);
    let record = service.confirm(&actor, appointment_id).await?;

    transition_response(&state, record, "Appointment confirmed").await
}

/// Cancel body is optional; an empty request cancels without a reason.
#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<SchedulingState>>,
    Extension(actor): Extension<Actor>,
    Path(appointment_id): Path<Uuid>,
    request: Option<Json<CancelAppointmentRequest>>,
) -> Result<Json<Value>, AppError> {
    let reason = request.and_then(|Json(body)| body.reason);
    let service = AppointmentSchedulingService::new(&state);
    let record = service.cancel(&actor, appointment_id, reason).await?;

    transition_response(&state, record, "Appointment cancelled").await
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<Arc<SchedulingState>>,
    Extension(actor): Extension<Actor>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentSchedulingService::new(&state);
    let record = service
        .reschedule(&actor, appointment_id, &request.scheduled_at)
        .await?;

    transition_response(&state, record, "Appointment rescheduled").await
}

#[axum::debug_handler]
pub async fn cancel_own_appointment(
    State(state): State<Arc<SchedulingState>>,
    Extension(actor): Extension<Actor>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentSchedulingService::new(&state);
    let record = service.cancel_as_patient(&actor, appointment_id).await?;

    transition_response(&state, record, "Appointment cancelled").await
}

#[axum::debug_handler]
pub async fn reschedule_own_appointment(
    State(state): State<Arc<SchedulingState>>,
    Extension(actor): Extension<Actor>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentSchedulingService::new(&state);
    let record = service
        .reschedule_as_patient(&actor, appointment_id, &request.scheduled_at)
        .await?;

    transition_response(&state, record, "Appointment rescheduled").await
}

#[axum::debug_handler]
pub async fn request_reschedule(
    State(state): State<Arc<SchedulingState>>,
    Extension(actor): Extension<Actor>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentSchedulingService::new(&state);
    let record = service.request_reschedule(&actor, appointment_id).await?;

    transition_response(&state, record, "Reschedule requested").await
}

#[axum::debug_handler]
pub async fn finalize_appointment(
    State(state): State<Arc<SchedulingState>>,
    Extension(actor): Extension<Actor>,
    Path(appointment_id): Path<Uuid>,
    request: Option<Json<FinalizeAppointmentRequest>>,
) -> Result<Json<Value>, AppError> {
    let content = request.and_then(|Json(body)| body.content);
    let service = AppointmentSchedulingService::new(&state);
    let record = service.finalize(&actor, appointment_id, content).await?;

    transition_response(&state, record, "Appointment concluded").await
}

// ==============================================================================
// PAYMENT, ANNOTATION, DELETE
// ==============================================================================

#[axum::debug_handler]
pub async fn mark_paid(
    State(state): State<Arc<SchedulingState>>,
    Extension(actor): Extension<Actor>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentSchedulingService::new(&state);

    let response = match service.mark_paid(&actor, appointment_id).await? {
        PaymentOutcome::Settled(payment) => json!({
            "success": true,
            "payment": payment,
            "message": "Payment registered"
        }),
        PaymentOutcome::AlreadySettled(payment) => json!({
            "success": true,
            "payment": payment,
            "message": "Payment already processed"
        }),
    };

    Ok(Json(response))
}

#[axum::debug_handler]
pub async fn upsert_annotation(
    State(state): State<Arc<SchedulingState>>,
    Extension(actor): Extension<Actor>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<AnnotationRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let service = AppointmentSchedulingService::new(&state);
    let outcome = service
        .upsert_annotation(&actor, appointment_id, request.content)
        .await?;

    let status = if outcome.created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((
        status,
        Json(json!({
            "success": true,
            "annotation": outcome.annotation
        })),
    ))
}

#[axum::debug_handler]
pub async fn get_annotation(
    State(state): State<Arc<SchedulingState>>,
    Extension(actor): Extension<Actor>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentSchedulingService::new(&state);
    let annotation = service.get_annotation(&actor, appointment_id).await?;

    Ok(Json(json!(annotation)))
}

#[axum::debug_handler]
pub async fn delete_appointment(
    State(state): State<Arc<SchedulingState>>,
    Extension(actor): Extension<Actor>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentSchedulingService::new(&state);
    service.delete_appointment(&actor, appointment_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment deleted"
    })))
}

// ==============================================================================
// AGENDA, DASHBOARD, AUDIT
// ==============================================================================

#[axum::debug_handler]
pub async fn doctor_agenda(
    State(state): State<Arc<SchedulingState>>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<AgendaQuery>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentSchedulingService::new(&state);
    let days = service.doctor_agenda(&actor, query.year, query.month).await?;

    Ok(Json(json!({
        "year": query.year,
        "month": query.month,
        "days": days
    })))
}

#[axum::debug_handler]
pub async fn clinic_dashboard(
    State(state): State<Arc<SchedulingState>>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentSchedulingService::new(&state);
    let dashboard = service.clinic_dashboard(&actor).await?;

    Ok(Json(json!(dashboard)))
}

#[axum::debug_handler]
pub async fn appointment_history(
    State(state): State<Arc<SchedulingState>>,
    Extension(actor): Extension<Actor>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let audit = AuditLogService::new(Arc::clone(&state.store));
    let entries = audit.history(&actor, appointment_id).await?;

    Ok(Json(json!({
        "appointment_id": appointment_id,
        "history": entries
    })))
}

#[axum::debug_handler]
pub async fn search_status_logs(
    State(state): State<Arc<SchedulingState>>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<AuditLogQuery>,
) -> Result<Json<Value>, AppError> {
    let audit = AuditLogService::new(Arc::clone(&state.store));
    let entries = audit.search(&actor, query).await?;

    Ok(Json(json!({
        "logs": entries,
        "total": entries.len()
    })))
}

async fn present(state: &SchedulingState, record: AppointmentRecord) -> Result<AppointmentView, AppError> {
    let view = AppointmentPresenter::new(Arc::clone(&state.directory))
        .present(record)
        .await?;
    Ok(view)
}

async fn transition_response(
    state: &SchedulingState,
    record: AppointmentRecord,
    message: &str,
) -> Result<Json<Value>, AppError> {
    let appointment = present(state, record).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": message
    })))
}
