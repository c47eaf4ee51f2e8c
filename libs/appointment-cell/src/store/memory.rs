use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::models::{
    Annotation, Appointment, AppointmentFilter, AppointmentRecord, Payment, SlotParty, SortOrder,
    StatusLogEntry, StatusLogFilter,
};

use super::{Changeset, SchedulingStore, StoreError};

#[derive(Default)]
struct SchedulingTables {
    appointments: HashMap<Uuid, Appointment>,
    payments: HashMap<Uuid, Payment>,
    annotations: HashMap<Uuid, Annotation>,
    status_log: Vec<StatusLogEntry>,
}

impl SchedulingTables {
    fn record(&self, appointment: &Appointment) -> AppointmentRecord {
        AppointmentRecord {
            appointment: appointment.clone(),
            payment: self.payments.get(&appointment.id).cloned(),
            annotation: self.annotations.get(&appointment.id).cloned(),
        }
    }

    fn check_version(&self, id: Uuid, expected: Option<DateTime<Utc>>) -> Result<(), StoreError> {
        let stored = self.appointments.get(&id).map(|a| a.updated_at);
        match (stored, expected) {
            (Some(stored), Some(expected)) if stored == expected => Ok(()),
            (None, None) => Ok(()),
            (Some(_), None) => Err(StoreError::Backend(format!("appointment {} already exists", id))),
            _ => Err(StoreError::Stale(id)),
        }
    }
}

/// Process-local store. A single write lock covers every commit, which makes
/// each changeset atomic and serializes slot claims.
#[derive(Default)]
pub struct MemorySchedulingStore {
    tables: RwLock<SchedulingTables>,
}

impl MemorySchedulingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SchedulingStore for MemorySchedulingStore {
    async fn get(&self, id: Uuid) -> Result<Option<AppointmentRecord>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.appointments.get(&id).map(|a| tables.record(a)))
    }

    async fn list(&self, filter: &AppointmentFilter) -> Result<Vec<AppointmentRecord>, StoreError> {
        let tables = self.tables.read().await;

        let mut matching: Vec<&Appointment> = tables
            .appointments
            .values()
            .filter(|appointment| filter.matches(appointment))
            .collect();
        matching.sort_by(|a, b| a.scheduled_at.cmp(&b.scheduled_at).then(a.id.cmp(&b.id)));

        Ok(matching
            .into_iter()
            .skip(filter.offset.unwrap_or(0))
            .take(filter.limit.unwrap_or(usize::MAX))
            .map(|appointment| tables.record(appointment))
            .collect())
    }

    async fn party_appointments(
        &self,
        party: SlotParty,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Appointment>, StoreError> {
        let tables = self.tables.read().await;

        Ok(tables
            .appointments
            .values()
            .filter(|a| match party {
                SlotParty::Doctor(id) => a.doctor_id == id,
                SlotParty::Patient(id) => a.patient_id == id,
            })
            .filter(|a| a.scheduled_at >= from && a.scheduled_at <= until)
            .filter(|a| Some(a.id) != exclude)
            .cloned()
            .collect())
    }

    async fn status_log(&self, filter: &StatusLogFilter) -> Result<Vec<StatusLogEntry>, StoreError> {
        let tables = self.tables.read().await;

        let mut entries: Vec<(usize, &StatusLogEntry)> = tables
            .status_log
            .iter()
            .enumerate()
            .filter(|(_, entry)| filter.matches(entry))
            .collect();

        entries.sort_by(|(seq_a, a), (seq_b, b)| a.recorded_at.cmp(&b.recorded_at).then(seq_a.cmp(seq_b)));
        if filter.order == SortOrder::NewestFirst {
            entries.reverse();
        }

        Ok(entries
            .into_iter()
            .skip(filter.offset.unwrap_or(0))
            .take(filter.limit.unwrap_or(usize::MAX))
            .map(|(_, entry)| entry.clone())
            .collect())
    }

    #[instrument(skip(self, changeset), fields(
        appointment = ?changeset.appointment.as_ref().map(|a| a.id),
        logs = changeset.status_logs.len()
    ))]
    async fn commit(&self, changeset: Changeset) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;

        // Validate everything before touching any table.
        if let Some(appointment) = &changeset.appointment {
            tables.check_version(appointment.id, changeset.expected_updated_at)?;
        }
        if let Some(id) = changeset.delete_appointment {
            if !tables.appointments.contains_key(&id) {
                return Err(StoreError::Stale(id));
            }
            if changeset.appointment.is_none() && changeset.expected_updated_at.is_some() {
                tables.check_version(id, changeset.expected_updated_at)?;
            }
        }
        if let Some((claim, policy)) = &changeset.slot_claim {
            if let Some(party) = policy.first_collision(claim, tables.appointments.values()) {
                warn!("Slot claim for {} lost to a concurrent booking", claim.scheduled_at);
                return Err(StoreError::SlotTaken(party));
            }
        }
        let children = changeset
            .payment
            .as_ref()
            .map(|payment| payment.appointment_id)
            .into_iter()
            .chain(changeset.annotation.as_ref().map(|annotation| annotation.appointment_id));
        for parent in children {
            let in_changeset = changeset.appointment.as_ref().is_some_and(|a| a.id == parent);
            if !in_changeset && !tables.appointments.contains_key(&parent) {
                return Err(StoreError::Stale(parent));
            }
        }

        if let Some(appointment) = changeset.appointment {
            tables.appointments.insert(appointment.id, appointment);
        }
        if let Some(payment) = changeset.payment {
            tables.payments.insert(payment.appointment_id, payment);
        }
        if let Some(annotation) = changeset.annotation {
            tables.annotations.insert(annotation.appointment_id, annotation);
        }
        tables.status_log.extend(changeset.status_logs);

        if let Some(id) = changeset.delete_appointment {
            tables.appointments.remove(&id);
            tables.payments.remove(&id);
            tables.annotations.remove(&id);
        }

        debug!("Changeset committed");
        Ok(())
    }
}
