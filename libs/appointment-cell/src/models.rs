// libs/appointment-cell/src/models.rs
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::actor::{Actor, Visibility};
use shared_models::directory::{Clinic, Specialty};

// ==============================================================================
// CORE ENTITIES
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    #[serde(alias = "PENDENTE")]
    Pending,
    #[serde(alias = "CONFIRMADA")]
    Confirmed,
    #[serde(alias = "CONCLUIDA")]
    Concluded,
    #[serde(alias = "CANCELADA")]
    Cancelled,
    #[serde(alias = "REAGENDAMENTO_SOLICITADO")]
    RescheduleRequested,
    /// Legacy value kept for stored rows. Behaves as `Pending`.
    #[serde(alias = "REMARCADA")]
    Rescheduled,
}

impl AppointmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Concluded | AppointmentStatus::Cancelled)
    }

    pub fn normalized(self) -> Self {
        match self {
            AppointmentStatus::Rescheduled => AppointmentStatus::Pending,
            other => other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "PENDING",
            AppointmentStatus::Confirmed => "CONFIRMED",
            AppointmentStatus::Concluded => "CONCLUDED",
            AppointmentStatus::Cancelled => "CANCELLED",
            AppointmentStatus::RescheduleRequested => "RESCHEDULE_REQUESTED",
            AppointmentStatus::Rescheduled => "RESCHEDULED",
        }
    }
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub clinic_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub value: Decimal,
    #[serde(default)]
    pub patient_reschedule_count: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[serde(alias = "PENDENTE")]
    Pending,
    #[serde(alias = "PAGO")]
    Paid,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub appointment_id: Uuid,
    pub status: PaymentStatus,
    pub amount: Decimal,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn is_settled(&self) -> bool {
        self.status == PaymentStatus::Paid
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Annotation {
    pub appointment_id: Uuid,
    pub content: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogAction {
    Created,
    Confirmed,
    Cancelled,
    Rescheduled,
    Concluded,
    RescheduleRequested,
    PaymentSettled,
    Deleted,
}

impl LogAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogAction::Created => "CREATED",
            LogAction::Confirmed => "CONFIRMED",
            LogAction::Cancelled => "CANCELLED",
            LogAction::Rescheduled => "RESCHEDULED",
            LogAction::Concluded => "CONCLUDED",
            LogAction::RescheduleRequested => "RESCHEDULE_REQUESTED",
            LogAction::PaymentSettled => "PAYMENT_SETTLED",
            LogAction::Deleted => "DELETED",
        }
    }
}

/// One row of the append-only status trail. The participant ids are copied
/// from the appointment so the row stays scoped after a hard delete.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusLogEntry {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub clinic_id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub action: LogAction,
    pub new_status: AppointmentStatus,
    pub reason: Option<String>,
    pub actor_id: Option<Uuid>,
    pub recorded_at: DateTime<Utc>,
}

/// An appointment together with its one-to-one children.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppointmentRecord {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub payment: Option<Payment>,
    pub annotation: Option<Annotation>,
}

impl AppointmentRecord {
    /// Clinical notes are not shown to patients.
    pub fn redacted_for(mut self, actor: &Actor) -> Self {
        if !actor.is_staff() {
            self.annotation = None;
        }
        self
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PatientSummary {
    pub id: Uuid,
    pub user_id: Uuid,
    pub full_name: String,
    pub cpf: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DoctorSummary {
    pub user_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub crm: Option<String>,
    pub specialty: Option<Specialty>,
}

/// Response shape of a single appointment. Parties missing from the
/// directory are reported as `null`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AppointmentView {
    #[serde(flatten)]
    pub record: AppointmentRecord,
    pub patient: Option<PatientSummary>,
    pub doctor: Option<DoctorSummary>,
    pub clinic: Option<Clinic>,
}

// ==============================================================================
// REQUEST / RESPONSE TYPES
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub clinic_id: Option<Uuid>,
    /// ISO-8601. Values without an offset are read in clinic local time.
    pub scheduled_at: String,
    pub value: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub scheduled_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationRequest {
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FinalizeAppointmentRequest {
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentSearchQuery {
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub clinic_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictCheckQuery {
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub scheduled_at: String,
    pub exclude_appointment_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictReport {
    pub has_conflict: bool,
    pub doctor_conflicts: Vec<Appointment>,
    pub patient_conflicts: Vec<Appointment>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditLogQuery {
    pub actor_id: Option<Uuid>,
    pub action: Option<LogAction>,
    pub appointment_id: Option<Uuid>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub order: SortOrder,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgendaQuery {
    pub year: i32,
    pub month: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgendaEntry {
    pub appointment_id: Uuid,
    pub time: String,
    pub patient_id: Uuid,
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgendaDay {
    pub date: NaiveDate,
    pub appointments: Vec<AgendaEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClinicDashboard {
    pub clinic_id: Option<Uuid>,
    pub today_total: usize,
    pub today_confirmed: usize,
    pub today_pending: usize,
    pub month_total: usize,
}

// ==============================================================================
// STORE QUERIES
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotParty {
    Doctor(Uuid),
    Patient(Uuid),
}

#[derive(Debug, Clone)]
pub struct AppointmentFilter {
    pub visibility: Visibility,
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub clinic_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub exclude_cancelled: bool,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl AppointmentFilter {
    pub fn visible_to(visibility: Visibility) -> Self {
        Self {
            visibility,
            doctor_id: None,
            patient_id: None,
            clinic_id: None,
            status: None,
            from: None,
            to: None,
            exclude_cancelled: false,
            limit: None,
            offset: None,
        }
    }

    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.visibility.admits(appointment.clinic_id, appointment.doctor_id, appointment.patient_id)
            && self.doctor_id.map_or(true, |id| appointment.doctor_id == id)
            && self.patient_id.map_or(true, |id| appointment.patient_id == id)
            && self.clinic_id.map_or(true, |id| appointment.clinic_id == id)
            && self.status.map_or(true, |status| appointment.status == status)
            && self.from.map_or(true, |from| appointment.scheduled_at >= from)
            && self.to.map_or(true, |to| appointment.scheduled_at < to)
            && !(self.exclude_cancelled && appointment.status == AppointmentStatus::Cancelled)
    }
}

#[derive(Debug, Clone)]
pub struct StatusLogFilter {
    pub visibility: Visibility,
    pub appointment_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    pub action: Option<LogAction>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub order: SortOrder,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl StatusLogFilter {
    pub fn matches(&self, entry: &StatusLogEntry) -> bool {
        self.visibility.admits(entry.clinic_id, entry.doctor_id, entry.patient_id)
            && self.appointment_id.map_or(true, |id| entry.appointment_id == id)
            && self.actor_id.map_or(true, |id| entry.actor_id == Some(id))
            && self.action.map_or(true, |action| entry.action == action)
            && self.from.map_or(true, |from| entry.recorded_at >= from)
            && self.to.map_or(true, |to| entry.recorded_at < to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_portuguese_statuses_deserialize() {
        let status: AppointmentStatus = serde_json::from_str("\"REAGENDAMENTO_SOLICITADO\"").unwrap();
        assert_eq!(status, AppointmentStatus::RescheduleRequested);

        let payment: PaymentStatus = serde_json::from_str("\"PAGO\"").unwrap();
        assert_eq!(payment, PaymentStatus::Paid);
    }

    #[test]
    fn legacy_rescheduled_behaves_as_pending() {
        assert_eq!(AppointmentStatus::Rescheduled.normalized(), AppointmentStatus::Pending);
        assert!(!AppointmentStatus::Rescheduled.is_terminal());
        assert!(AppointmentStatus::Cancelled.is_terminal());
        assert!(AppointmentStatus::Concluded.is_terminal());
    }
}
