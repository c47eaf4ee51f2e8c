use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use appointment_cell::error::{AppointmentError, ConflictParty, RuleViolation};
use appointment_cell::models::{
    AppointmentSearchQuery, AppointmentStatus, AuditLogQuery, ConflictCheckQuery, CreateAppointmentRequest,
    LogAction, PaymentStatus,
};
use appointment_cell::services::audit::AuditLogService;
use appointment_cell::services::scheduling::{AppointmentSchedulingService, PaymentOutcome};
use appointment_cell::state::SchedulingState;
use appointment_cell::store::{MemorySchedulingStore, SchedulingStore};
use shared_config::ConflictStrategyKind;
use shared_database::directory::{DirectoryStore, MemoryDirectory};
use shared_models::actor::Actor;
use shared_utils::clock::FixedClock;
use shared_utils::test_utils::{ClinicFixture, TestConfig, TestUser};
use tokio_test::assert_ok;

/// Monday 2025-10-13 09:00 in the clinic (UTC-3).
fn start_of_week() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 13, 12, 0, 0).unwrap()
}

struct Harness {
    service: AppointmentSchedulingService,
    audit: AuditLogService,
    store: Arc<MemorySchedulingStore>,
    directory: Arc<MemoryDirectory>,
    clock: Arc<FixedClock>,
    fixture: ClinicFixture,
}

impl Harness {
    async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    async fn with_config(config: TestConfig) -> Self {
        let directory = Arc::new(MemoryDirectory::new());
        let fixture = ClinicFixture::seed(&directory).await;
        let store = Arc::new(MemorySchedulingStore::new());
        let clock = Arc::new(FixedClock::new(start_of_week()));

        let state = SchedulingState::new(config.to_arc(), store.clone(), directory.clone(), clock.clone());

        Self {
            service: AppointmentSchedulingService::new(&state),
            audit: AuditLogService::new(store.clone()),
            store,
            directory,
            clock,
            fixture,
        }
    }

    async fn actor(&self, user: &TestUser) -> Actor {
        self.directory.resolve_actor(user.id).await.unwrap()
    }

    fn booking(&self, patient_id: Uuid, doctor_id: Uuid, scheduled_at: &str) -> CreateAppointmentRequest {
        CreateAppointmentRequest {
            doctor_id: Some(doctor_id),
            patient_id: Some(patient_id),
            clinic_id: Some(self.fixture.clinic.id),
            scheduled_at: scheduled_at.to_string(),
            value: None,
        }
    }

    /// Secretary books the fixture patient with the fixture doctor.
    async fn book(&self, scheduled_at: &str) -> Uuid {
        let secretary = self.actor(&self.fixture.secretary).await;
        let request = self.booking(self.fixture.patient_id, self.fixture.doctor.id, scheduled_at);
        self.service
            .create_appointment(&secretary, request)
            .await
            .unwrap()
            .appointment
            .id
    }

    async fn history_actions(&self, id: Uuid) -> Vec<LogAction> {
        let admin = self.actor(&self.fixture.admin).await;
        self.audit
            .history(&admin, id)
            .await
            .unwrap()
            .into_iter()
            .map(|entry| entry.action)
            .collect()
    }
}

// ==============================================================================
// BOOKING
// ==============================================================================

#[tokio::test]
async fn test_patient_books_pending_appointment_at_doctor_fee() {
    let h = Harness::new().await;
    let patient = h.actor(&h.fixture.patient).await;

    let request = CreateAppointmentRequest {
        doctor_id: Some(h.fixture.doctor.id),
        patient_id: None,
        clinic_id: Some(h.fixture.clinic.id),
        scheduled_at: "2025-10-15T14:30:00".to_string(),
        value: Some(Decimal::new(1, 0)),
    };
    let record = h.service.create_appointment(&patient, request).await.unwrap();

    assert_eq!(record.appointment.status, AppointmentStatus::Pending);
    assert_eq!(record.appointment.patient_id, h.fixture.patient_id);
    assert_eq!(
        record.appointment.scheduled_at,
        Utc.with_ymd_and_hms(2025, 10, 15, 17, 30, 0).unwrap()
    );
    // Patients cannot set their own price
    assert_eq!(record.appointment.value, h.fixture.consultation_fee);

    let payment = record.payment.unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(payment.amount, h.fixture.consultation_fee);

    assert_eq!(h.history_actions(record.appointment.id).await, vec![LogAction::Created]);
}

#[tokio::test]
async fn test_double_booking_doctor_is_rejected() {
    let h = Harness::new().await;
    h.book("2025-10-15T14:30:00").await;

    let secretary = h.actor(&h.fixture.secretary).await;
    let request = h.booking(h.fixture.other_patient_id, h.fixture.doctor.id, "2025-10-15T14:30:00-03:00");
    let result = h.service.create_appointment(&secretary, request).await;

    assert_matches!(result, Err(AppointmentError::Conflict(ConflictParty::Doctor)));
}

#[tokio::test]
async fn test_double_booking_patient_is_rejected() {
    let h = Harness::new().await;
    h.book("2025-10-15T14:30:00").await;

    let secretary = h.actor(&h.fixture.secretary).await;
    let request = h.booking(h.fixture.patient_id, h.fixture.other_doctor.id, "2025-10-15T17:30:00Z");
    let result = h.service.create_appointment(&secretary, request).await;

    assert_matches!(result, Err(AppointmentError::Conflict(ConflictParty::Patient)));
}

#[tokio::test]
async fn test_cancelled_appointment_releases_its_slot() {
    let h = Harness::new().await;
    let id = h.book("2025-10-15T14:30:00").await;
    let secretary = h.actor(&h.fixture.secretary).await;

    h.service.cancel(&secretary, id, None).await.unwrap();

    let request = h.booking(h.fixture.other_patient_id, h.fixture.doctor.id, "2025-10-15T14:30:00");
    assert!(h.service.create_appointment(&secretary, request).await.is_ok());
}

#[tokio::test]
async fn test_cancelled_slot_stays_taken_when_release_is_disabled() {
    let mut config = TestConfig::default();
    config.scheduling.release_cancelled_slots = false;
    let h = Harness::with_config(config).await;

    let id = h.book("2025-10-15T14:30:00").await;
    let secretary = h.actor(&h.fixture.secretary).await;
    h.service.cancel(&secretary, id, None).await.unwrap();

    let request = h.booking(h.fixture.other_patient_id, h.fixture.doctor.id, "2025-10-15T14:30:00");
    assert_matches!(
        h.service.create_appointment(&secretary, request).await,
        Err(AppointmentError::Conflict(ConflictParty::Doctor))
    );
}

#[tokio::test]
async fn test_windowed_strategy_uses_half_open_window() {
    let mut config = TestConfig::default();
    config.scheduling.conflict_strategy = ConflictStrategyKind::Windowed;
    config.scheduling.conflict_window_minutes = 30;
    let h = Harness::with_config(config).await;

    h.book("2025-10-15T14:30:00").await;
    let secretary = h.actor(&h.fixture.secretary).await;

    let overlapping = h.booking(h.fixture.other_patient_id, h.fixture.doctor.id, "2025-10-15T15:00:00");
    assert_matches!(
        h.service.create_appointment(&secretary, overlapping).await,
        Err(AppointmentError::Conflict(ConflictParty::Doctor))
    );

    let earlier = h.booking(h.fixture.other_patient_id, h.fixture.doctor.id, "2025-10-15T14:00:00");
    assert!(h.service.create_appointment(&secretary, earlier).await.is_ok());
}

#[tokio::test]
async fn test_slot_rules_reject_past_closed_and_after_hours() {
    let h = Harness::new().await;
    let secretary = h.actor(&h.fixture.secretary).await;

    for (slot, expected) in [
        ("2025-10-10T10:00:00", RuleViolation::SlotInPast),
        ("2025-10-19T10:00:00", RuleViolation::ClosedDay),
        ("2025-10-15T21:00:00", RuleViolation::OutsideBusinessHours { open: 8, close: 20 }),
    ] {
        let request = h.booking(h.fixture.patient_id, h.fixture.doctor.id, slot);
        let result = h.service.create_appointment(&secretary, request).await;
        assert_matches!(result, Err(AppointmentError::Rule(violation)) if violation == expected);
    }
}

#[tokio::test]
async fn test_booking_checks_parties_and_scope() {
    let h = Harness::new().await;

    // Doctor does not attend the other clinic
    let other_secretary = h.actor(&h.fixture.other_secretary).await;
    let mut request = h.booking(h.fixture.patient_id, h.fixture.doctor.id, "2025-10-15T14:30:00");
    request.clinic_id = Some(h.fixture.other_clinic.id);
    assert_matches!(
        h.service.create_appointment(&other_secretary, request).await,
        Err(AppointmentError::Validation(_))
    );

    // A secretary cannot book into another clinic
    let request = h.booking(h.fixture.patient_id, h.fixture.other_doctor.id, "2025-10-15T14:30:00");
    assert_matches!(
        h.service.create_appointment(&other_secretary, request).await,
        Err(AppointmentError::Forbidden(_))
    );

    // Patients only book for themselves
    let patient = h.actor(&h.fixture.patient).await;
    let request = h.booking(h.fixture.other_patient_id, h.fixture.doctor.id, "2025-10-15T14:30:00");
    assert_matches!(
        h.service.create_appointment(&patient, request).await,
        Err(AppointmentError::Forbidden(_))
    );

    let secretary = h.actor(&h.fixture.secretary).await;
    let request = h.booking(Uuid::new_v4(), h.fixture.doctor.id, "2025-10-15T14:30:00");
    assert_matches!(
        h.service.create_appointment(&secretary, request).await,
        Err(AppointmentError::NotFound("Patient"))
    );
}

// ==============================================================================
// LIFECYCLE
// ==============================================================================

#[tokio::test]
async fn test_each_transition_writes_exactly_one_log_entry() {
    let h = Harness::new().await;
    let id = h.book("2025-10-15T14:30:00").await;
    let secretary = h.actor(&h.fixture.secretary).await;
    let doctor = h.actor(&h.fixture.doctor).await;

    h.clock.advance(Duration::minutes(5));
    assert_ok!(h.service.confirm(&secretary, id).await);
    h.clock.advance(Duration::minutes(5));
    assert_ok!(h.service.request_reschedule(&doctor, id).await);
    h.clock.advance(Duration::minutes(5));
    let rescheduled = assert_ok!(h.service.reschedule(&secretary, id, "2025-10-16T09:00:00").await);
    assert_eq!(rescheduled.appointment.status, AppointmentStatus::Pending);
    h.clock.advance(Duration::minutes(5));
    assert_ok!(h.service.confirm(&doctor, id).await);
    h.clock.advance(Duration::minutes(5));
    let concluded = assert_ok!(
        h.service
            .finalize(&doctor, id, Some("Paciente estavel".to_string()))
            .await
    );

    assert_eq!(concluded.appointment.status, AppointmentStatus::Concluded);
    assert_eq!(concluded.annotation.unwrap().content, "Paciente estavel");
    assert_eq!(
        h.history_actions(id).await,
        vec![
            LogAction::Created,
            LogAction::Confirmed,
            LogAction::RescheduleRequested,
            LogAction::Rescheduled,
            LogAction::Confirmed,
            LogAction::Concluded,
        ]
    );
}

#[tokio::test]
async fn test_terminal_appointments_reject_transitions_without_logging() {
    let h = Harness::new().await;
    let id = h.book("2025-10-15T14:30:00").await;
    let secretary = h.actor(&h.fixture.secretary).await;

    h.service.cancel(&secretary, id, Some("Clinic closed".to_string())).await.unwrap();

    assert_matches!(
        h.service.confirm(&secretary, id).await,
        Err(AppointmentError::Rule(RuleViolation::Terminal(AppointmentStatus::Cancelled)))
    );
    assert_matches!(
        h.service.reschedule(&secretary, id, "2025-10-16T09:00:00").await,
        Err(AppointmentError::Rule(RuleViolation::Terminal(_)))
    );
    assert_eq!(h.history_actions(id).await, vec![LogAction::Created, LogAction::Cancelled]);
}

#[tokio::test]
async fn test_cancel_reason_is_stored_separately_from_status() {
    let h = Harness::new().await;
    let id = h.book("2025-10-15T14:30:00").await;
    let secretary = h.actor(&h.fixture.secretary).await;

    h.service.cancel(&secretary, id, Some("  Doctor ill ".to_string())).await.unwrap();

    let history = h.audit.history(&secretary, id).await.unwrap();
    let last = history.last().unwrap();
    assert_eq!(last.new_status, AppointmentStatus::Cancelled);
    assert_eq!(last.reason.as_deref(), Some("Doctor ill"));
    assert_eq!(last.actor_id, Some(h.fixture.secretary.id));
}

#[tokio::test]
async fn test_reschedule_to_own_slot_is_not_a_conflict() {
    let h = Harness::new().await;
    let id = h.book("2025-10-15T14:30:00").await;
    let secretary = h.actor(&h.fixture.secretary).await;

    let record = h.service.reschedule(&secretary, id, "2025-10-15T14:30:00").await.unwrap();
    assert_eq!(record.appointment.id, id);
}

#[tokio::test]
async fn test_reschedule_into_taken_slot_is_rejected() {
    let h = Harness::new().await;
    let first = h.book("2025-10-15T14:30:00").await;
    h.book("2025-10-16T10:00:00").await;
    let secretary = h.actor(&h.fixture.secretary).await;

    assert_matches!(
        h.service.reschedule(&secretary, first, "2025-10-16T10:00:00").await,
        Err(AppointmentError::Conflict(ConflictParty::Doctor))
    );
}

#[tokio::test]
async fn test_only_assigned_doctor_concludes() {
    let h = Harness::new().await;
    let id = h.book("2025-10-15T14:30:00").await;

    // Visible through the shared clinic, but not their appointment
    let other_doctor = h.actor(&h.fixture.other_doctor).await;
    assert_matches!(
        h.service.finalize(&other_doctor, id, Some("Not my patient".to_string())).await,
        Err(AppointmentError::NotFound(_))
    );

    let secretary = h.actor(&h.fixture.secretary).await;
    assert_matches!(
        h.service.finalize(&secretary, id, Some("Closing early".to_string())).await,
        Err(AppointmentError::Forbidden(_))
    );

    let record = h.store.get(id).await.unwrap().unwrap();
    assert_eq!(record.appointment.status, AppointmentStatus::Pending);
    assert!(record.annotation.is_none());
    assert_eq!(h.history_actions(id).await, vec![LogAction::Created]);
}

#[tokio::test]
async fn test_update_status_dispatches_and_ignores_same_status() {
    let h = Harness::new().await;
    let id = h.book("2025-10-15T14:30:00").await;
    let secretary = h.actor(&h.fixture.secretary).await;

    let change = h.service.update_status(&secretary, id, AppointmentStatus::Confirmed).await.unwrap();
    assert!(change.changed);

    let change = h.service.update_status(&secretary, id, AppointmentStatus::Confirmed).await.unwrap();
    assert!(!change.changed);

    assert_matches!(
        h.service.update_status(&secretary, id, AppointmentStatus::Pending).await,
        Err(AppointmentError::Validation(_))
    );
    assert_eq!(h.history_actions(id).await, vec![LogAction::Created, LogAction::Confirmed]);
}

// ==============================================================================
// PATIENT SELF-SERVICE
// ==============================================================================

#[tokio::test]
async fn test_patient_cancel_needs_24_hours_notice() {
    let h = Harness::new().await;
    let id = h.book("2025-10-15T14:30:00").await;
    let patient = h.actor(&h.fixture.patient).await;

    h.clock.set(Utc.with_ymd_and_hms(2025, 10, 15, 0, 0, 0).unwrap());
    assert_matches!(
        h.service.cancel_as_patient(&patient, id).await,
        Err(AppointmentError::Rule(RuleViolation::CancellationNotice { hours: 24 }))
    );

    h.clock.set(start_of_week());
    let record = h.service.cancel_as_patient(&patient, id).await.unwrap();
    assert_eq!(record.appointment.status, AppointmentStatus::Cancelled);
}

#[tokio::test]
async fn test_patient_cannot_cancel_a_paid_appointment() {
    let h = Harness::new().await;
    let id = h.book("2025-10-15T14:30:00").await;
    let secretary = h.actor(&h.fixture.secretary).await;
    let patient = h.actor(&h.fixture.patient).await;

    h.service.mark_paid(&secretary, id).await.unwrap();

    assert_matches!(
        h.service.cancel_as_patient(&patient, id).await,
        Err(AppointmentError::Rule(RuleViolation::PaymentSettled))
    );
}

#[tokio::test]
async fn test_patient_reschedule_limit_and_counter() {
    let h = Harness::new().await;
    let id = h.book("2025-10-20T10:00:00").await;
    let patient = h.actor(&h.fixture.patient).await;

    let first = h.service.reschedule_as_patient(&patient, id, "2025-10-21T10:00:00").await.unwrap();
    assert_eq!(first.appointment.patient_reschedule_count, 1);
    let second = h.service.reschedule_as_patient(&patient, id, "2025-10-22T10:00:00").await.unwrap();
    assert_eq!(second.appointment.patient_reschedule_count, 2);

    assert_matches!(
        h.service.reschedule_as_patient(&patient, id, "2025-10-23T10:00:00").await,
        Err(AppointmentError::Rule(RuleViolation::RescheduleLimit { limit: 2 }))
    );

    // Staff reschedules are not counted
    let secretary = h.actor(&h.fixture.secretary).await;
    let staff = h.service.reschedule(&secretary, id, "2025-10-23T10:00:00").await.unwrap();
    assert_eq!(staff.appointment.patient_reschedule_count, 2);
}

#[tokio::test]
async fn test_patient_reschedule_needs_notice() {
    let h = Harness::new().await;
    // 53.5 hours ahead of the clock
    let id = h.book("2025-10-15T14:30:00").await;
    let patient = h.actor(&h.fixture.patient).await;

    assert_matches!(
        h.service.reschedule_as_patient(&patient, id, "2025-10-22T10:00:00").await,
        Err(AppointmentError::Rule(RuleViolation::RescheduleNotice { hours: 72 }))
    );
}

#[tokio::test]
async fn test_patients_cannot_touch_other_patients_appointments() {
    let h = Harness::new().await;
    let id = h.book("2025-10-20T10:00:00").await;
    let other_patient = h.actor(&h.fixture.other_patient).await;

    assert_matches!(
        h.service.cancel_as_patient(&other_patient, id).await,
        Err(AppointmentError::NotFound(_))
    );
    assert_matches!(
        h.service.get_appointment(&other_patient, id).await,
        Err(AppointmentError::NotFound(_))
    );

    let listed = h
        .service
        .list_appointments(&other_patient, AppointmentSearchQuery::default())
        .await
        .unwrap();
    assert!(listed.is_empty());
}

// ==============================================================================
// PAYMENT, ANNOTATION, DELETE
// ==============================================================================

#[tokio::test]
async fn test_mark_paid_is_idempotent() {
    let h = Harness::new().await;
    let id = h.book("2025-10-15T14:30:00").await;
    let secretary = h.actor(&h.fixture.secretary).await;

    assert_matches!(
        h.service.mark_paid(&secretary, id).await,
        Ok(PaymentOutcome::Settled(payment)) if payment.paid_at == Some(start_of_week())
    );
    assert_matches!(h.service.mark_paid(&secretary, id).await, Ok(PaymentOutcome::AlreadySettled(_)));

    let record = h.service.get_appointment(&secretary, id).await.unwrap();
    assert_eq!(record.appointment.status, AppointmentStatus::Pending);
    assert_eq!(h.history_actions(id).await, vec![LogAction::Created, LogAction::PaymentSettled]);

    let doctor = h.actor(&h.fixture.doctor).await;
    assert_matches!(h.service.mark_paid(&doctor, id).await, Err(AppointmentError::Forbidden(_)));
}

#[tokio::test]
async fn test_annotation_upsert_and_patient_redaction() {
    let h = Harness::new().await;
    let id = h.book("2025-10-15T14:30:00").await;
    let doctor = h.actor(&h.fixture.doctor).await;
    let patient = h.actor(&h.fixture.patient).await;

    let created = h.service.upsert_annotation(&doctor, id, "Primeira nota".to_string()).await.unwrap();
    assert!(created.created);
    let updated = h.service.upsert_annotation(&doctor, id, "Nota revisada".to_string()).await.unwrap();
    assert!(!updated.created);

    assert_eq!(h.service.get_annotation(&doctor, id).await.unwrap().content, "Nota revisada");
    assert_matches!(h.service.get_annotation(&patient, id).await, Err(AppointmentError::Forbidden(_)));
    assert_matches!(
        h.service.upsert_annotation(&doctor, id, "   ".to_string()).await,
        Err(AppointmentError::Validation(_))
    );

    let seen_by_patient = h.service.get_appointment(&patient, id).await.unwrap();
    assert!(seen_by_patient.annotation.is_none());
}

#[tokio::test]
async fn test_delete_keeps_the_audit_trail() {
    let h = Harness::new().await;
    let id = h.book("2025-10-15T14:30:00").await;
    let secretary = h.actor(&h.fixture.secretary).await;
    let doctor = h.actor(&h.fixture.doctor).await;

    assert_matches!(h.service.delete_appointment(&doctor, id).await, Err(AppointmentError::Forbidden(_)));

    h.service.delete_appointment(&secretary, id).await.unwrap();

    assert!(h.store.get(id).await.unwrap().is_none());
    assert_matches!(h.service.get_appointment(&secretary, id).await, Err(AppointmentError::NotFound(_)));

    let history = h.audit.history(&secretary, id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].action, LogAction::Deleted);
    assert_eq!(history[1].new_status, AppointmentStatus::Cancelled);
}

// ==============================================================================
// VISIBILITY, AGENDA, DASHBOARD, AUDIT
// ==============================================================================

#[tokio::test]
async fn test_other_clinic_staff_cannot_see_appointment() {
    let h = Harness::new().await;
    let id = h.book("2025-10-15T14:30:00").await;
    let other_secretary = h.actor(&h.fixture.other_secretary).await;

    assert_matches!(
        h.service.get_appointment(&other_secretary, id).await,
        Err(AppointmentError::NotFound(_))
    );
    assert_matches!(
        h.service.cancel(&other_secretary, id, None).await,
        Err(AppointmentError::NotFound(_))
    );
}

#[tokio::test]
async fn test_conflict_check_reports_both_parties() {
    let h = Harness::new().await;
    h.book("2025-10-15T14:30:00").await;
    let secretary = h.actor(&h.fixture.secretary).await;

    let report = h
        .service
        .check_conflicts(
            &secretary,
            ConflictCheckQuery {
                doctor_id: h.fixture.doctor.id,
                patient_id: h.fixture.patient_id,
                scheduled_at: "2025-10-15T14:30:00".to_string(),
                exclude_appointment_id: None,
            },
        )
        .await
        .unwrap();

    assert!(report.has_conflict);
    assert_eq!(report.doctor_conflicts.len(), 1);
    assert_eq!(report.patient_conflicts.len(), 1);
}

#[tokio::test]
async fn test_doctor_agenda_groups_by_local_day() {
    let h = Harness::new().await;
    let first = h.book("2025-10-15T14:30:00").await;
    h.book("2025-10-15T08:00:00").await;
    let cancelled = h.book("2025-10-16T19:30:00").await;
    let secretary = h.actor(&h.fixture.secretary).await;
    h.service.cancel(&secretary, cancelled, None).await.unwrap();

    let doctor = h.actor(&h.fixture.doctor).await;
    let agenda = h.service.doctor_agenda(&doctor, 2025, 10).await.unwrap();

    assert_eq!(agenda.len(), 1);
    assert_eq!(agenda[0].date.to_string(), "2025-10-15");
    let times: Vec<&str> = agenda[0].appointments.iter().map(|e| e.time.as_str()).collect();
    assert_eq!(times, vec!["08:00", "14:30"]);
    assert_eq!(agenda[0].appointments[1].appointment_id, first);

    assert_matches!(
        h.service.doctor_agenda(&secretary, 2025, 10).await,
        Err(AppointmentError::Forbidden(_))
    );
}

#[tokio::test]
async fn test_clinic_dashboard_counts_today_and_month() {
    let h = Harness::new().await;
    let today = h.book("2025-10-13T15:00:00").await;
    h.book("2025-10-13T16:00:00").await;
    h.book("2025-10-28T10:00:00").await;
    let secretary = h.actor(&h.fixture.secretary).await;
    h.service.confirm(&secretary, today).await.unwrap();

    let dashboard = h.service.clinic_dashboard(&secretary).await.unwrap();
    assert_eq!(dashboard.clinic_id, Some(h.fixture.clinic.id));
    assert_eq!(dashboard.today_total, 2);
    assert_eq!(dashboard.today_confirmed, 1);
    assert_eq!(dashboard.today_pending, 1);
    assert_eq!(dashboard.month_total, 3);

    let patient = h.actor(&h.fixture.patient).await;
    assert_matches!(h.service.clinic_dashboard(&patient).await, Err(AppointmentError::Forbidden(_)));
}

#[tokio::test]
async fn test_audit_search_respects_scope() {
    let h = Harness::new().await;
    let id = h.book("2025-10-15T14:30:00").await;
    let secretary = h.actor(&h.fixture.secretary).await;
    h.clock.advance(Duration::minutes(1));
    h.service.confirm(&secretary, id).await.unwrap();

    let admin = h.actor(&h.fixture.admin).await;
    let all = h.audit.search(&admin, AuditLogQuery::default()).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].action, LogAction::Confirmed);

    let other_secretary = h.actor(&h.fixture.other_secretary).await;
    assert!(h.audit.search(&other_secretary, AuditLogQuery::default()).await.unwrap().is_empty());

    let only_confirms = AuditLogQuery {
        action: Some(LogAction::Confirmed),
        ..AuditLogQuery::default()
    };
    assert_eq!(h.audit.search(&secretary, only_confirms).await.unwrap().len(), 1);

    let patient = h.actor(&h.fixture.patient).await;
    assert_matches!(
        h.audit.search(&patient, AuditLogQuery::default()).await,
        Err(AppointmentError::Forbidden(_))
    );
}
