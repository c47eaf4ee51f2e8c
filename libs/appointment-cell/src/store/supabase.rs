use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;
use shared_models::actor::Visibility;

use crate::error::ConflictParty;
use crate::models::{
    Annotation, Appointment, AppointmentFilter, AppointmentRecord, Payment, SlotParty, SortOrder,
    StatusLogEntry, StatusLogFilter,
};

use super::{Changeset, SchedulingStore, StoreError};

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum CommitOutcome {
    Committed,
    Conflict { party: ConflictParty },
    Stale { appointment_id: Uuid },
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn id_list(ids: &[Uuid]) -> String {
    ids.iter().map(Uuid::to_string).collect::<Vec<_>>().join(",")
}

fn visibility_filter(visibility: &Visibility) -> Option<String> {
    match visibility {
        Visibility::Everything => None,
        Visibility::Clinic(id) => Some(format!("clinic_id=eq.{}", id)),
        Visibility::ClinicsOrDoctor { clinic_ids, doctor_id } if clinic_ids.is_empty() => {
            Some(format!("doctor_id=eq.{}", doctor_id))
        }
        Visibility::ClinicsOrDoctor { clinic_ids, doctor_id } => Some(format!(
            "or=(clinic_id.in.({}),doctor_id.eq.{})",
            id_list(clinic_ids),
            doctor_id
        )),
        Visibility::Doctor(id) => Some(format!("doctor_id=eq.{}", id)),
        Visibility::Patient(id) => Some(format!("patient_id=eq.{}", id)),
    }
}

/// Store backed by the PostgREST tables `appointments`, `payments`,
/// `annotations` and `appointment_status_logs`. Writes go through the
/// `commit_appointment_changes` function so each changeset is one
/// Postgres transaction.
pub struct SupabaseSchedulingStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseSchedulingStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn select<T>(&self, table: &str, parts: &[String]) -> Result<Vec<T>, StoreError>
    where
        T: serde::de::DeserializeOwned,
    {
        self.supabase
            .select(table, &parts.join("&"))
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn attach_children(&self, appointments: Vec<Appointment>) -> Result<Vec<AppointmentRecord>, StoreError> {
        if appointments.is_empty() {
            return Ok(vec![]);
        }

        let ids: Vec<Uuid> = appointments.iter().map(|a| a.id).collect();
        let filter = vec![format!("appointment_id=in.({})", id_list(&ids))];

        let mut payments: HashMap<Uuid, Payment> = self
            .select::<Payment>("payments", &filter)
            .await?
            .into_iter()
            .map(|p| (p.appointment_id, p))
            .collect();
        let mut annotations: HashMap<Uuid, Annotation> = self
            .select::<Annotation>("annotations", &filter)
            .await?
            .into_iter()
            .map(|a| (a.appointment_id, a))
            .collect();

        Ok(appointments
            .into_iter()
            .map(|appointment| AppointmentRecord {
                payment: payments.remove(&appointment.id),
                annotation: annotations.remove(&appointment.id),
                appointment,
            })
            .collect())
    }

    fn commit_payload(changeset: &Changeset) -> Value {
        let slot_claim = changeset.slot_claim.as_ref().map(|(claim, policy)| {
            json!({
                "doctor_id": claim.doctor_id,
                "patient_id": claim.patient_id,
                "scheduled_at": timestamp(claim.scheduled_at),
                "exclude_appointment_id": claim.exclude_appointment_id,
                "window_minutes": policy.window_minutes(),
                "release_cancelled_slots": policy.release_cancelled_slots,
            })
        });

        json!({
            "appointment": changeset.appointment,
            "expected_updated_at": changeset.expected_updated_at.map(timestamp),
            "payment": changeset.payment,
            "annotation": changeset.annotation,
            "status_logs": changeset.status_logs,
            "delete_appointment": changeset.delete_appointment,
            "slot_claim": slot_claim,
        })
    }
}

#[async_trait]
impl SchedulingStore for SupabaseSchedulingStore {
    async fn get(&self, id: Uuid) -> Result<Option<AppointmentRecord>, StoreError> {
        debug!("Fetching appointment {}", id);
        let rows: Vec<Appointment> = self.select("appointments", &[format!("id=eq.{}", id)]).await?;
        Ok(self.attach_children(rows).await?.into_iter().next())
    }

    async fn list(&self, filter: &AppointmentFilter) -> Result<Vec<AppointmentRecord>, StoreError> {
        let mut parts: Vec<String> = visibility_filter(&filter.visibility).into_iter().collect();

        if let Some(id) = filter.doctor_id {
            parts.push(format!("doctor_id=eq.{}", id));
        }
        if let Some(id) = filter.patient_id {
            parts.push(format!("patient_id=eq.{}", id));
        }
        if let Some(id) = filter.clinic_id {
            parts.push(format!("clinic_id=eq.{}", id));
        }
        if let Some(status) = filter.status {
            parts.push(format!("status=eq.{}", status.as_str()));
        } else if filter.exclude_cancelled {
            parts.push("status=neq.CANCELLED".to_string());
        }
        if let Some(from) = filter.from {
            parts.push(format!("scheduled_at=gte.{}", timestamp(from)));
        }
        if let Some(to) = filter.to {
            parts.push(format!("scheduled_at=lt.{}", timestamp(to)));
        }
        parts.push("order=scheduled_at.asc,id.asc".to_string());
        if let Some(limit) = filter.limit {
            parts.push(format!("limit={}", limit));
        }
        if let Some(offset) = filter.offset {
            parts.push(format!("offset={}", offset));
        }

        let rows: Vec<Appointment> = self.select("appointments", &parts).await?;
        self.attach_children(rows).await
    }

    async fn party_appointments(
        &self,
        party: SlotParty,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Appointment>, StoreError> {
        let mut parts = vec![
            match party {
                SlotParty::Doctor(id) => format!("doctor_id=eq.{}", id),
                SlotParty::Patient(id) => format!("patient_id=eq.{}", id),
            },
            format!("scheduled_at=gte.{}", timestamp(from)),
            format!("scheduled_at=lte.{}", timestamp(until)),
        ];
        if let Some(exclude_id) = exclude {
            parts.push(format!("id=neq.{}", exclude_id));
        }
        parts.push("order=scheduled_at.asc".to_string());

        self.select("appointments", &parts).await
    }

    async fn status_log(&self, filter: &StatusLogFilter) -> Result<Vec<StatusLogEntry>, StoreError> {
        let mut parts: Vec<String> = visibility_filter(&filter.visibility).into_iter().collect();

        if let Some(id) = filter.appointment_id {
            parts.push(format!("appointment_id=eq.{}", id));
        }
        if let Some(id) = filter.actor_id {
            parts.push(format!("actor_id=eq.{}", id));
        }
        if let Some(action) = filter.action {
            parts.push(format!("action=eq.{}", action.as_str()));
        }
        if let Some(from) = filter.from {
            parts.push(format!("recorded_at=gte.{}", timestamp(from)));
        }
        if let Some(to) = filter.to {
            parts.push(format!("recorded_at=lt.{}", timestamp(to)));
        }
        parts.push(
            match filter.order {
                SortOrder::NewestFirst => "order=recorded_at.desc,seq.desc",
                SortOrder::OldestFirst => "order=recorded_at.asc,seq.asc",
            }
            .to_string(),
        );
        if let Some(limit) = filter.limit {
            parts.push(format!("limit={}", limit));
        }
        if let Some(offset) = filter.offset {
            parts.push(format!("offset={}", offset));
        }

        self.select("appointment_status_logs", &parts).await
    }

    #[instrument(skip(self, changeset), fields(logs = changeset.status_logs.len()))]
    async fn commit(&self, changeset: Changeset) -> Result<(), StoreError> {
        let payload = Self::commit_payload(&changeset);

        let outcome: CommitOutcome = self
            .supabase
            .rpc("commit_appointment_changes", json!({ "payload": payload }))
            .await
            .map_err(|e| {
                error!("Commit failed: {}", e);
                StoreError::Backend(e.to_string())
            })?;

        match outcome {
            CommitOutcome::Committed => Ok(()),
            CommitOutcome::Conflict { party } => {
                warn!("Database rejected slot claim: {:?} conflict", party);
                Err(StoreError::SlotTaken(party))
            }
            CommitOutcome::Stale { appointment_id } => Err(StoreError::Stale(appointment_id)),
        }
    }
}
