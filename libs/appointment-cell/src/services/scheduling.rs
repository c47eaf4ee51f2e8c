// libs/appointment-cell/src/services/scheduling.rs
use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use shared_database::directory::DirectoryStore;
use shared_models::actor::Actor;
use shared_utils::clock::Clock;

use crate::error::AppointmentError;
use crate::models::{
    AgendaDay, AgendaEntry, Annotation, Appointment, AppointmentFilter, AppointmentRecord,
    AppointmentSearchQuery, AppointmentStatus, ClinicDashboard, ConflictCheckQuery, ConflictReport,
    CreateAppointmentRequest, LogAction, Payment, PaymentStatus,
};
use crate::services::audit::log_entry;
use crate::services::conflict::{ConflictDetectionService, ConflictPolicy, SlotClaim};
use crate::services::lifecycle::{AppointmentLifecycleService, Transition};
use crate::services::rules::SchedulingRules;
use crate::state::SchedulingState;
use crate::store::{Changeset, SchedulingStore};

const DEFAULT_PAGE: usize = 100;
const MAX_PAGE: usize = 500;

#[derive(Debug, Clone, PartialEq)]
pub enum PaymentOutcome {
    Settled(Payment),
    AlreadySettled(Payment),
}

#[derive(Debug, Clone)]
pub struct StatusChange {
    pub record: AppointmentRecord,
    pub changed: bool,
}

#[derive(Debug, Clone)]
pub struct AnnotationOutcome {
    pub annotation: Annotation,
    pub created: bool,
}

/// What a validated transition writes besides the status change.
struct Step {
    transition: Transition,
    reason: Option<String>,
    new_slot: Option<SlotClaim>,
    count_patient_reschedule: bool,
    annotation: Option<String>,
}

impl Step {
    fn new(transition: Transition) -> Self {
        Self {
            transition,
            reason: None,
            new_slot: None,
            count_patient_reschedule: false,
            annotation: None,
        }
    }
}

pub struct AppointmentSchedulingService {
    store: Arc<dyn SchedulingStore>,
    directory: Arc<dyn DirectoryStore>,
    clock: Arc<dyn Clock>,
    conflicts: ConflictDetectionService,
    lifecycle: AppointmentLifecycleService,
    rules: SchedulingRules,
}

impl AppointmentSchedulingService {
    pub fn new(state: &SchedulingState) -> Self {
        let policy = ConflictPolicy::from_config(&state.config.scheduling);

        Self {
            store: Arc::clone(&state.store),
            directory: Arc::clone(&state.directory),
            clock: Arc::clone(&state.clock),
            conflicts: ConflictDetectionService::new(Arc::clone(&state.store), policy),
            lifecycle: AppointmentLifecycleService::new(),
            rules: SchedulingRules::from_config(&state.config.scheduling),
        }
    }

    pub fn rules(&self) -> &SchedulingRules {
        &self.rules
    }

    // ==============================================================================
    // BOOKING
    // ==============================================================================

    pub async fn create_appointment(
        &self,
        actor: &Actor,
        request: CreateAppointmentRequest,
    ) -> Result<AppointmentRecord, AppointmentError> {
        let scheduled_at = self.rules.parse_timestamp(&request.scheduled_at)?;
        let (patient_id, doctor_id, clinic_id) = booking_parties(actor, &request)?;

        debug!(
            "Booking doctor {} with patient {} at clinic {} for {}",
            doctor_id, patient_id, clinic_id, scheduled_at
        );

        let doctor = self
            .directory
            .find_doctor(doctor_id)
            .await?
            .ok_or(AppointmentError::NotFound("Doctor"))?;
        self.directory
            .find_clinic(clinic_id)
            .await?
            .ok_or(AppointmentError::NotFound("Clinic"))?;
        if !doctor.works_at(clinic_id) {
            return Err(AppointmentError::Validation(
                "The doctor does not attend at the selected clinic".to_string(),
            ));
        }
        self.directory
            .find_patient(patient_id)
            .await?
            .ok_or(AppointmentError::NotFound("Patient"))?;

        let value = match actor {
            Actor::Patient { .. } => doctor.consultation_fee,
            _ => request.value.unwrap_or(doctor.consultation_fee),
        };
        if value.is_sign_negative() {
            return Err(AppointmentError::Validation("value cannot be negative".to_string()));
        }

        let now = self.clock.now();
        self.rules.validate_slot(scheduled_at, now)?;

        let claim = SlotClaim {
            doctor_id,
            patient_id,
            scheduled_at,
            exclude_appointment_id: None,
        };
        self.conflicts.ensure_slot_free(&claim).await?;

        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id,
            doctor_id,
            clinic_id,
            scheduled_at,
            status: AppointmentStatus::Pending,
            value,
            patient_reschedule_count: 0,
            created_at: now,
            updated_at: now,
        };
        let payment = Payment {
            appointment_id: appointment.id,
            status: PaymentStatus::Pending,
            amount: value,
            paid_at: None,
            created_at: now,
            updated_at: now,
        };
        let log = log_entry(&appointment, LogAction::Created, AppointmentStatus::Pending, None, actor, now);

        self.store
            .commit(Changeset {
                appointment: Some(appointment.clone()),
                payment: Some(payment.clone()),
                status_logs: vec![log],
                slot_claim: Some((claim, self.conflicts.policy())),
                ..Changeset::default()
            })
            .await?;

        info!("Appointment {} booked for {} by {}", appointment.id, scheduled_at, actor.role());

        Ok(AppointmentRecord {
            appointment,
            payment: Some(payment),
            annotation: None,
        })
    }

    // ==============================================================================
    // READS
    // ==============================================================================

    pub async fn get_appointment(&self, actor: &Actor, id: Uuid) -> Result<AppointmentRecord, AppointmentError> {
        Ok(self.load_visible(actor, id).await?.redacted_for(actor))
    }

    pub async fn list_appointments(
        &self,
        actor: &Actor,
        query: AppointmentSearchQuery,
    ) -> Result<Vec<AppointmentRecord>, AppointmentError> {
        let filter = AppointmentFilter {
            doctor_id: query.doctor_id,
            patient_id: query.patient_id,
            clinic_id: query.clinic_id,
            status: query.status,
            from: query.from_date,
            to: query.to_date,
            limit: Some(query.limit.unwrap_or(DEFAULT_PAGE).min(MAX_PAGE)),
            offset: query.offset,
            ..AppointmentFilter::visible_to(actor.visibility())
        };

        let records = self.store.list(&filter).await?;
        debug!("Listed {} appointments for {}", records.len(), actor.user_id());
        Ok(records.into_iter().map(|r| r.redacted_for(actor)).collect())
    }

    pub async fn check_conflicts(
        &self,
        actor: &Actor,
        query: ConflictCheckQuery,
    ) -> Result<ConflictReport, AppointmentError> {
        if let Actor::Patient { patient_id, .. } = actor {
            if *patient_id != query.patient_id {
                return Err(AppointmentError::Forbidden(
                    "Patients can only check their own schedule".to_string(),
                ));
            }
        }

        let claim = SlotClaim {
            doctor_id: query.doctor_id,
            patient_id: query.patient_id,
            scheduled_at: self.rules.parse_timestamp(&query.scheduled_at)?,
            exclude_appointment_id: query.exclude_appointment_id,
        };
        self.conflicts.check_conflicts(&claim).await
    }

    // ==============================================================================
    // STATUS TRANSITIONS
    // ==============================================================================

    pub async fn confirm(&self, actor: &Actor, id: Uuid) -> Result<AppointmentRecord, AppointmentError> {
        let record = self.load_visible(actor, id).await?;
        self.lifecycle.validate(actor, &record.appointment, Transition::Confirm)?;
        self.apply(actor, record, Step::new(Transition::Confirm)).await
    }

    /// Staff cancellation. No notice or payment restrictions apply.
    pub async fn cancel(
        &self,
        actor: &Actor,
        id: Uuid,
        reason: Option<String>,
    ) -> Result<AppointmentRecord, AppointmentError> {
        require_staff(actor, "Patients must use the self-service cancellation")?;

        let record = self.load_visible(actor, id).await?;
        self.lifecycle.validate(actor, &record.appointment, Transition::Cancel)?;

        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| "Cancelled by clinic staff".to_string());

        self.apply(
            actor,
            record,
            Step {
                reason: Some(reason),
                ..Step::new(Transition::Cancel)
            },
        )
        .await
    }

    pub async fn cancel_as_patient(&self, actor: &Actor, id: Uuid) -> Result<AppointmentRecord, AppointmentError> {
        require_patient(actor)?;

        let record = self.load_visible(actor, id).await?;
        self.lifecycle.validate(actor, &record.appointment, Transition::Cancel)?;
        self.rules
            .check_patient_cancellation(&record.appointment, record.payment.as_ref(), self.clock.now())?;

        self.apply(
            actor,
            record,
            Step {
                reason: Some("Cancelled by the patient".to_string()),
                ..Step::new(Transition::Cancel)
            },
        )
        .await
    }

    pub async fn reschedule(
        &self,
        actor: &Actor,
        id: Uuid,
        scheduled_at: &str,
    ) -> Result<AppointmentRecord, AppointmentError> {
        require_staff(actor, "Patients must use the self-service reschedule")?;

        let record = self.load_visible(actor, id).await?;
        self.lifecycle.validate(actor, &record.appointment, Transition::Reschedule)?;
        let claim = self.claim_new_slot(&record.appointment, scheduled_at).await?;

        self.apply(
            actor,
            record,
            Step {
                new_slot: Some(claim),
                ..Step::new(Transition::Reschedule)
            },
        )
        .await
    }

    pub async fn reschedule_as_patient(
        &self,
        actor: &Actor,
        id: Uuid,
        scheduled_at: &str,
    ) -> Result<AppointmentRecord, AppointmentError> {
        require_patient(actor)?;

        let record = self.load_visible(actor, id).await?;
        self.lifecycle.validate(actor, &record.appointment, Transition::Reschedule)?;
        self.rules
            .check_patient_reschedule(&record.appointment, record.payment.as_ref(), self.clock.now())?;
        let claim = self.claim_new_slot(&record.appointment, scheduled_at).await?;

        self.apply(
            actor,
            record,
            Step {
                new_slot: Some(claim),
                count_patient_reschedule: true,
                ..Step::new(Transition::Reschedule)
            },
        )
        .await
    }

    pub async fn request_reschedule(&self, actor: &Actor, id: Uuid) -> Result<AppointmentRecord, AppointmentError> {
        let record = self.load_visible(actor, id).await?;
        self.lifecycle
            .validate(actor, &record.appointment, Transition::RequestReschedule)?;
        self.apply(actor, record, Step::new(Transition::RequestReschedule)).await
    }

    /// Concludes the appointment and stores the clinical note in the same
    /// commit.
    pub async fn finalize(
        &self,
        actor: &Actor,
        id: Uuid,
        content: Option<String>,
    ) -> Result<AppointmentRecord, AppointmentError> {
        let record = self.load_visible(actor, id).await?;
        self.lifecycle.validate(actor, &record.appointment, Transition::Conclude)?;

        self.apply(
            actor,
            record,
            Step {
                annotation: content.filter(|c| !c.trim().is_empty()),
                ..Step::new(Transition::Conclude)
            },
        )
        .await
    }

    /// Sets a status directly by routing it through the matching transition.
    /// Setting the current status again changes nothing and logs nothing.
    pub async fn update_status(
        &self,
        actor: &Actor,
        id: Uuid,
        target: AppointmentStatus,
    ) -> Result<StatusChange, AppointmentError> {
        require_staff(actor, "Patients cannot change appointment status")?;

        let record = self.load_visible(actor, id).await?;
        if record.appointment.status == target {
            debug!("Appointment {} already {}", id, target);
            return Ok(StatusChange { record, changed: false });
        }

        let transition = Transition::for_target(target).ok_or_else(|| {
            AppointmentError::Validation(format!(
                "Status {} cannot be set directly, reschedule the appointment instead",
                target
            ))
        })?;
        self.lifecycle.validate(actor, &record.appointment, transition)?;

        let record = self.apply(actor, record, Step::new(transition)).await?;
        Ok(StatusChange { record, changed: true })
    }

    // ==============================================================================
    // PAYMENT / ANNOTATION / DELETE
    // ==============================================================================

    pub async fn mark_paid(&self, actor: &Actor, id: Uuid) -> Result<PaymentOutcome, AppointmentError> {
        if !matches!(actor, Actor::Secretary { .. }) {
            return Err(AppointmentError::Forbidden(
                "Only secretaries can register payments".to_string(),
            ));
        }

        let record = self.load_visible(actor, id).await?;
        let mut payment = record.payment.clone().ok_or(AppointmentError::NotFound("Payment"))?;
        if payment.is_settled() {
            info!("Payment for appointment {} was already settled", id);
            return Ok(PaymentOutcome::AlreadySettled(payment));
        }

        let now = self.clock.now();
        payment.status = PaymentStatus::Paid;
        payment.paid_at = Some(now);
        payment.updated_at = now;

        let mut appointment = record.appointment.clone();
        appointment.updated_at = now;
        let log = log_entry(&appointment, LogAction::PaymentSettled, appointment.status, None, actor, now);

        self.store
            .commit(Changeset {
                appointment: Some(appointment),
                expected_updated_at: Some(record.appointment.updated_at),
                payment: Some(payment.clone()),
                status_logs: vec![log],
                ..Changeset::default()
            })
            .await?;

        info!("Payment for appointment {} settled", id);
        Ok(PaymentOutcome::Settled(payment))
    }

    pub async fn upsert_annotation(
        &self,
        actor: &Actor,
        id: Uuid,
        content: String,
    ) -> Result<AnnotationOutcome, AppointmentError> {
        require_clinical_staff(actor)?;

        let content = content.trim().to_string();
        if content.is_empty() {
            return Err(AppointmentError::Validation("content is required".to_string()));
        }

        let record = self.load_visible(actor, id).await?;
        let created = record.annotation.is_none();
        let annotation = Annotation {
            appointment_id: id,
            content,
            updated_at: self.clock.now(),
        };

        self.store
            .commit(Changeset {
                annotation: Some(annotation.clone()),
                ..Changeset::default()
            })
            .await?;

        debug!("Annotation for {} {}", id, if created { "created" } else { "updated" });
        Ok(AnnotationOutcome { annotation, created })
    }

    pub async fn get_annotation(&self, actor: &Actor, id: Uuid) -> Result<Annotation, AppointmentError> {
        require_clinical_staff(actor)?;
        self.load_visible(actor, id)
            .await?
            .annotation
            .ok_or(AppointmentError::NotFound("Annotation"))
    }

    /// Administrative removal. The cancellation is logged first and the log
    /// survives the delete.
    pub async fn delete_appointment(&self, actor: &Actor, id: Uuid) -> Result<(), AppointmentError> {
        if !matches!(actor, Actor::Admin { .. } | Actor::Secretary { .. }) {
            return Err(AppointmentError::Forbidden(
                "Only administrators and secretaries can delete appointments".to_string(),
            ));
        }

        let record = self.load_visible(actor, id).await?;
        let now = self.clock.now();
        let log = log_entry(
            &record.appointment,
            LogAction::Deleted,
            AppointmentStatus::Cancelled,
            Some("Appointment removed".to_string()),
            actor,
            now,
        );

        self.store
            .commit(Changeset {
                expected_updated_at: Some(record.appointment.updated_at),
                status_logs: vec![log],
                delete_appointment: Some(id),
                ..Changeset::default()
            })
            .await?;

        info!("Appointment {} deleted by {}", id, actor.user_id());
        Ok(())
    }

    // ==============================================================================
    // AGENDA / DASHBOARD
    // ==============================================================================

    pub async fn doctor_agenda(&self, actor: &Actor, year: i32, month: u32) -> Result<Vec<AgendaDay>, AppointmentError> {
        let Actor::Doctor { user_id, .. } = actor else {
            return Err(AppointmentError::Forbidden("Only doctors have an agenda".to_string()));
        };

        let (from, to) = self.rules.month_bounds(year, month)?;
        let filter = AppointmentFilter {
            doctor_id: Some(*user_id),
            from: Some(from),
            to: Some(to),
            exclude_cancelled: true,
            ..AppointmentFilter::visible_to(actor.visibility())
        };

        let mut days: BTreeMap<chrono::NaiveDate, Vec<AgendaEntry>> = BTreeMap::new();
        for record in self.store.list(&filter).await? {
            let local = self.rules.local(record.appointment.scheduled_at);
            days.entry(local.date_naive()).or_default().push(AgendaEntry {
                appointment_id: record.appointment.id,
                time: local.format("%H:%M").to_string(),
                patient_id: record.appointment.patient_id,
                status: record.appointment.status,
            });
        }

        Ok(days
            .into_iter()
            .map(|(date, appointments)| AgendaDay { date, appointments })
            .collect())
    }

    pub async fn clinic_dashboard(&self, actor: &Actor) -> Result<ClinicDashboard, AppointmentError> {
        let clinic_id = match actor {
            Actor::Secretary { clinic_id, .. } | Actor::Admin { clinic_id: Some(clinic_id), .. } => *clinic_id,
            _ => {
                return Err(AppointmentError::Forbidden(
                    "The dashboard is only available to clinic staff".to_string(),
                ))
            }
        };

        let today = self.rules.local(self.clock.now()).date_naive();
        let (day_start, day_end) = self.rules.day_bounds(today);
        let (month_start, month_end) = self.rules.month_bounds(today.year(), today.month())?;

        let filter = AppointmentFilter {
            clinic_id: Some(clinic_id),
            from: Some(month_start),
            to: Some(month_end),
            exclude_cancelled: true,
            ..AppointmentFilter::visible_to(actor.visibility())
        };
        let month = self.store.list(&filter).await?;

        let is_today = |at: DateTime<Utc>| at >= day_start && at < day_end;
        let today_records: Vec<&AppointmentRecord> = month
            .iter()
            .filter(|r| is_today(r.appointment.scheduled_at))
            .collect();

        Ok(ClinicDashboard {
            clinic_id: Some(clinic_id),
            today_total: today_records.len(),
            today_confirmed: today_records
                .iter()
                .filter(|r| r.appointment.status == AppointmentStatus::Confirmed)
                .count(),
            today_pending: today_records
                .iter()
                .filter(|r| r.appointment.status.normalized() == AppointmentStatus::Pending)
                .count(),
            month_total: month.len(),
        })
    }

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    /// Appointments outside the actor's scope are reported as missing.
    async fn load_visible(&self, actor: &Actor, id: Uuid) -> Result<AppointmentRecord, AppointmentError> {
        let record = self
            .store
            .get(id)
            .await?
            .ok_or(AppointmentError::NotFound("Appointment"))?;

        let appointment = &record.appointment;
        if !actor
            .visibility()
            .admits(appointment.clinic_id, appointment.doctor_id, appointment.patient_id)
        {
            debug!("Appointment {} hidden from {}", id, actor.user_id());
            return Err(AppointmentError::NotFound("Appointment"));
        }

        Ok(record)
    }

    async fn claim_new_slot(&self, appointment: &Appointment, raw: &str) -> Result<SlotClaim, AppointmentError> {
        let scheduled_at = self.rules.parse_timestamp(raw)?;
        self.rules.validate_slot(scheduled_at, self.clock.now())?;

        let claim = SlotClaim {
            doctor_id: appointment.doctor_id,
            patient_id: appointment.patient_id,
            scheduled_at,
            exclude_appointment_id: Some(appointment.id),
        };
        self.conflicts.ensure_slot_free(&claim).await?;
        Ok(claim)
    }

    async fn apply(&self, actor: &Actor, record: AppointmentRecord, step: Step) -> Result<AppointmentRecord, AppointmentError> {
        let now = self.clock.now();
        let previous = record.appointment.updated_at;

        let mut appointment = record.appointment;
        appointment.status = step.transition.target();
        appointment.updated_at = now;
        if let Some(claim) = &step.new_slot {
            appointment.scheduled_at = claim.scheduled_at;
        }
        if step.count_patient_reschedule {
            appointment.patient_reschedule_count = appointment.patient_reschedule_count.saturating_add(1);
        }

        let annotation = step.annotation.map(|content| Annotation {
            appointment_id: appointment.id,
            content,
            updated_at: now,
        });
        let log = log_entry(
            &appointment,
            step.transition.log_action(),
            appointment.status,
            step.reason,
            actor,
            now,
        );

        self.store
            .commit(Changeset {
                appointment: Some(appointment.clone()),
                expected_updated_at: Some(previous),
                annotation: annotation.clone(),
                status_logs: vec![log],
                slot_claim: step.new_slot.map(|claim| (claim, self.conflicts.policy())),
                ..Changeset::default()
            })
            .await?;

        info!(
            "Appointment {} is now {} ({} by {})",
            appointment.id,
            appointment.status,
            step.transition.verb(),
            actor.role()
        );

        Ok(AppointmentRecord {
            appointment,
            payment: record.payment,
            annotation: annotation.or(record.annotation),
        })
    }
}

fn require_staff(actor: &Actor, message: &str) -> Result<(), AppointmentError> {
    if actor.is_staff() {
        Ok(())
    } else {
        Err(AppointmentError::Forbidden(message.to_string()))
    }
}

fn require_patient(actor: &Actor) -> Result<(), AppointmentError> {
    match actor {
        Actor::Patient { .. } => Ok(()),
        _ => Err(AppointmentError::Forbidden(
            "Self-service changes are only available to patients".to_string(),
        )),
    }
}

fn require_clinical_staff(actor: &Actor) -> Result<(), AppointmentError> {
    match actor {
        Actor::Patient { .. } => Err(AppointmentError::Forbidden(
            "Annotations are restricted to clinic staff".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Resolves (patient, doctor, clinic) for a booking from the actor and the
/// request.
fn booking_parties(actor: &Actor, request: &CreateAppointmentRequest) -> Result<(Uuid, Uuid, Uuid), AppointmentError> {
    let required = |value: Option<Uuid>, field: &str| {
        value.ok_or_else(|| AppointmentError::Validation(format!("{} is required", field)))
    };

    let parties = match actor {
        Actor::Patient { patient_id, .. } => {
            if request.patient_id.is_some_and(|requested| requested != *patient_id) {
                return Err(AppointmentError::Forbidden(
                    "Patients can only book appointments for themselves".to_string(),
                ));
            }
            return Ok((
                *patient_id,
                required(request.doctor_id, "doctor_id")?,
                required(request.clinic_id, "clinic_id")?,
            ));
        }
        Actor::Secretary { clinic_id, .. } => (
            required(request.patient_id, "patient_id")?,
            required(request.doctor_id, "doctor_id")?,
            request.clinic_id.unwrap_or(*clinic_id),
        ),
        Actor::Doctor { user_id, clinic_ids } => {
            let clinic_id = match (request.clinic_id, clinic_ids.as_slice()) {
                (Some(clinic_id), _) => clinic_id,
                (None, [only]) => *only,
                (None, _) => required(None, "clinic_id")?,
            };
            (
                required(request.patient_id, "patient_id")?,
                request.doctor_id.unwrap_or(*user_id),
                clinic_id,
            )
        }
        Actor::Admin { clinic_id, .. } => (
            required(request.patient_id, "patient_id")?,
            required(request.doctor_id, "doctor_id")?,
            required(request.clinic_id.or(*clinic_id), "clinic_id")?,
        ),
    };

    if !actor.serves_clinic(parties.2) {
        return Err(AppointmentError::Forbidden(
            "You cannot book appointments for this clinic".to_string(),
        ));
    }

    Ok(parties)
}
