use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use shared_models::actor::Actor;

use crate::error::AppointmentError;
use crate::models::{
    Appointment, AppointmentStatus, AuditLogQuery, LogAction, SortOrder, StatusLogEntry,
    StatusLogFilter,
};
use crate::store::SchedulingStore;

const MAX_PAGE: usize = 500;

/// Builds the log row for an accepted transition.
pub fn log_entry(
    appointment: &Appointment,
    action: LogAction,
    new_status: AppointmentStatus,
    reason: Option<String>,
    actor: &Actor,
    recorded_at: DateTime<Utc>,
) -> StatusLogEntry {
    StatusLogEntry {
        id: Uuid::new_v4(),
        appointment_id: appointment.id,
        clinic_id: appointment.clinic_id,
        doctor_id: appointment.doctor_id,
        patient_id: appointment.patient_id,
        action,
        new_status,
        reason,
        actor_id: Some(actor.user_id()),
        recorded_at,
    }
}

pub struct AuditLogService {
    store: Arc<dyn SchedulingStore>,
}

impl AuditLogService {
    pub fn new(store: Arc<dyn SchedulingStore>) -> Self {
        Self { store }
    }

    /// Chronological trail of one appointment, including appointments that
    /// were deleted since.
    pub async fn history(&self, actor: &Actor, appointment_id: Uuid) -> Result<Vec<StatusLogEntry>, AppointmentError> {
        let filter = StatusLogFilter {
            visibility: actor.visibility(),
            appointment_id: Some(appointment_id),
            actor_id: None,
            action: None,
            from: None,
            to: None,
            order: SortOrder::OldestFirst,
            limit: None,
            offset: None,
        };

        let entries = self.store.status_log(&filter).await?;
        if entries.is_empty() {
            return Err(AppointmentError::NotFound("Appointment"));
        }

        debug!("Loaded {} history entries for {}", entries.len(), appointment_id);
        Ok(entries)
    }

    /// Administrative view across appointments, newest first unless asked
    /// otherwise.
    pub async fn search(&self, actor: &Actor, query: AuditLogQuery) -> Result<Vec<StatusLogEntry>, AppointmentError> {
        let visibility = actor
            .audit_visibility()
            .ok_or_else(|| AppointmentError::Forbidden("Patients cannot browse the audit log".to_string()))?;

        let filter = StatusLogFilter {
            visibility,
            appointment_id: query.appointment_id,
            actor_id: query.actor_id,
            action: query.action,
            from: query.from_date,
            to: query.to_date,
            order: query.order,
            limit: Some(query.limit.unwrap_or(100).min(MAX_PAGE)),
            offset: query.offset,
        };

        Ok(self.store.status_log(&filter).await?)
    }
}
