use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::{ConflictStrategyKind, SchedulingConfig, MAX_CONFLICT_WINDOW_MINUTES};

use crate::error::{AppointmentError, ConflictParty};
use crate::models::{Appointment, AppointmentStatus, ConflictReport, SlotParty};
use crate::store::SchedulingStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ConflictStrategy {
    /// Only an identical start time collides.
    ExactSlot,
    /// Another start time within `[t - minutes, t + minutes)` collides.
    Windowed { minutes: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictPolicy {
    pub strategy: ConflictStrategy,
    pub release_cancelled_slots: bool,
}

impl Default for ConflictPolicy {
    fn default() -> Self {
        Self {
            strategy: ConflictStrategy::ExactSlot,
            release_cancelled_slots: true,
        }
    }
}

/// The (doctor, patient, time) triple a write wants to occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotClaim {
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub exclude_appointment_id: Option<Uuid>,
}

impl ConflictPolicy {
    pub fn from_config(config: &SchedulingConfig) -> Self {
        let strategy = match config.conflict_strategy {
            ConflictStrategyKind::ExactSlot => ConflictStrategy::ExactSlot,
            ConflictStrategyKind::Windowed => ConflictStrategy::Windowed {
                minutes: config.conflict_window_minutes.clamp(0, MAX_CONFLICT_WINDOW_MINUTES),
            },
        };

        Self {
            strategy,
            release_cancelled_slots: config.release_cancelled_slots,
        }
    }

    pub fn window_minutes(&self) -> i64 {
        match self.strategy {
            ConflictStrategy::ExactSlot => 0,
            ConflictStrategy::Windowed { minutes } => minutes,
        }
    }

    /// Inclusive bounds wide enough to fetch every candidate collision.
    pub fn search_range(&self, at: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let window = Duration::minutes(self.window_minutes());
        (at - window, at + window)
    }

    pub fn occupies_slot(&self, status: AppointmentStatus) -> bool {
        !(self.release_cancelled_slots && status == AppointmentStatus::Cancelled)
    }

    pub fn collides(&self, at: DateTime<Utc>, existing: &Appointment) -> bool {
        if !self.occupies_slot(existing.status) {
            return false;
        }

        match self.strategy {
            ConflictStrategy::ExactSlot => existing.scheduled_at == at,
            ConflictStrategy::Windowed { minutes } => {
                let window = Duration::minutes(minutes);
                existing.scheduled_at >= at - window && existing.scheduled_at < at + window
            }
        }
    }

    /// Doctor collisions are reported before patient collisions.
    pub fn first_collision<'a, I>(&self, claim: &SlotClaim, appointments: I) -> Option<ConflictParty>
    where
        I: IntoIterator<Item = &'a Appointment>,
    {
        let mut patient_hit = false;

        for existing in appointments {
            if Some(existing.id) == claim.exclude_appointment_id
                || !self.collides(claim.scheduled_at, existing)
            {
                continue;
            }
            if existing.doctor_id == claim.doctor_id {
                return Some(ConflictParty::Doctor);
            }
            if existing.patient_id == claim.patient_id {
                patient_hit = true;
            }
        }

        patient_hit.then_some(ConflictParty::Patient)
    }
}

pub struct ConflictDetectionService {
    store: Arc<dyn SchedulingStore>,
    policy: ConflictPolicy,
}

impl ConflictDetectionService {
    pub fn new(store: Arc<dyn SchedulingStore>, policy: ConflictPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    /// Fails with a doctor or patient conflict when the claim cannot be booked.
    pub async fn ensure_slot_free(&self, claim: &SlotClaim) -> Result<(), AppointmentError> {
        let doctor_conflicts = self.party_conflicts(SlotParty::Doctor(claim.doctor_id), claim).await?;
        if !doctor_conflicts.is_empty() {
            warn!(
                "Doctor {} already booked at {} ({} conflicting)",
                claim.doctor_id,
                claim.scheduled_at,
                doctor_conflicts.len()
            );
            return Err(AppointmentError::Conflict(ConflictParty::Doctor));
        }

        let patient_conflicts = self.party_conflicts(SlotParty::Patient(claim.patient_id), claim).await?;
        if !patient_conflicts.is_empty() {
            warn!("Patient {} already booked at {}", claim.patient_id, claim.scheduled_at);
            return Err(AppointmentError::Conflict(ConflictParty::Patient));
        }

        Ok(())
    }

    pub async fn check_conflicts(&self, claim: &SlotClaim) -> Result<ConflictReport, AppointmentError> {
        let doctor_conflicts = self.party_conflicts(SlotParty::Doctor(claim.doctor_id), claim).await?;
        let patient_conflicts = self.party_conflicts(SlotParty::Patient(claim.patient_id), claim).await?;

        Ok(ConflictReport {
            has_conflict: !doctor_conflicts.is_empty() || !patient_conflicts.is_empty(),
            doctor_conflicts,
            patient_conflicts,
        })
    }

    async fn party_conflicts(
        &self,
        party: SlotParty,
        claim: &SlotClaim,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let (from, until) = self.policy.search_range(claim.scheduled_at);
        debug!("Checking {:?} between {} and {}", party, from, until);

        let candidates = self
            .store
            .party_appointments(party, from, until, claim.exclude_appointment_id)
            .await?;

        Ok(candidates
            .into_iter()
            .filter(|existing| Some(existing.id) != claim.exclude_appointment_id)
            .filter(|existing| self.policy.collides(claim.scheduled_at, existing))
            .collect())
    }
}
