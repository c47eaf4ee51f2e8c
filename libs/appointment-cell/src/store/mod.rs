use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::error::{AppointmentError, ConflictParty};
use crate::models::{
    Annotation, Appointment, AppointmentFilter, AppointmentRecord, Payment, SlotParty,
    StatusLogEntry, StatusLogFilter,
};
use crate::services::conflict::{ConflictPolicy, SlotClaim};

mod memory;
mod supabase;

pub use memory::MemorySchedulingStore;
pub use supabase::SupabaseSchedulingStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("slot already taken by the {}", .0.label())]
    SlotTaken(ConflictParty),

    #[error("appointment {0} changed since it was read")]
    Stale(Uuid),

    #[error("{0}")]
    Backend(String),
}

impl From<StoreError> for AppointmentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::SlotTaken(party) => AppointmentError::Conflict(party),
            StoreError::Stale(id) => AppointmentError::Stale(id),
            StoreError::Backend(msg) => AppointmentError::Storage(msg),
        }
    }
}

/// Everything one accepted operation writes. A store applies a changeset
/// completely or not at all.
#[derive(Debug, Clone, Default)]
pub struct Changeset {
    pub appointment: Option<Appointment>,
    /// `updated_at` the stored appointment must still carry.
    pub expected_updated_at: Option<DateTime<Utc>>,
    pub payment: Option<Payment>,
    pub annotation: Option<Annotation>,
    pub status_logs: Vec<StatusLogEntry>,
    pub delete_appointment: Option<Uuid>,
    /// Re-checked inside the write so two racing bookings cannot both land.
    pub slot_claim: Option<(SlotClaim, ConflictPolicy)>,
}

#[async_trait]
pub trait SchedulingStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<AppointmentRecord>, StoreError>;

    /// Ordered by scheduled time, earliest first.
    async fn list(&self, filter: &AppointmentFilter) -> Result<Vec<AppointmentRecord>, StoreError>;

    /// Appointments of one party with `from <= scheduled_at <= until`.
    async fn party_appointments(
        &self,
        party: SlotParty,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Appointment>, StoreError>;

    async fn status_log(&self, filter: &StatusLogFilter) -> Result<Vec<StatusLogEntry>, StoreError>;

    async fn commit(&self, changeset: Changeset) -> Result<(), StoreError>;
}
