// libs/appointment-cell/src/services/lifecycle.rs
use tracing::{debug, info, warn};

use shared_models::actor::{Actor, Role};

use crate::error::{AppointmentError, RuleViolation};
use crate::models::{Appointment, AppointmentStatus, LogAction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    Confirm,
    Cancel,
    Reschedule,
    Conclude,
    RequestReschedule,
}

impl Transition {
    pub const ALL: [Transition; 5] = [
        Transition::Confirm,
        Transition::Cancel,
        Transition::Reschedule,
        Transition::Conclude,
        Transition::RequestReschedule,
    ];

    pub fn target(&self) -> AppointmentStatus {
        match self {
            Transition::Confirm => AppointmentStatus::Confirmed,
            Transition::Cancel => AppointmentStatus::Cancelled,
            Transition::Reschedule => AppointmentStatus::Pending,
            Transition::Conclude => AppointmentStatus::Concluded,
            Transition::RequestReschedule => AppointmentStatus::RescheduleRequested,
        }
    }

    pub fn log_action(&self) -> LogAction {
        match self {
            Transition::Confirm => LogAction::Confirmed,
            Transition::Cancel => LogAction::Cancelled,
            Transition::Reschedule => LogAction::Rescheduled,
            Transition::Conclude => LogAction::Concluded,
            Transition::RequestReschedule => LogAction::RescheduleRequested,
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            Transition::Confirm => "confirm",
            Transition::Cancel => "cancel",
            Transition::Reschedule => "reschedule",
            Transition::Conclude => "conclude",
            Transition::RequestReschedule => "request a reschedule of",
        }
    }

    /// The transition a direct status update stands for. `PENDING` is only
    /// reachable through a reschedule, which needs a new slot.
    pub fn for_target(status: AppointmentStatus) -> Option<Transition> {
        match status {
            AppointmentStatus::Confirmed => Some(Transition::Confirm),
            AppointmentStatus::Cancelled => Some(Transition::Cancel),
            AppointmentStatus::Concluded => Some(Transition::Conclude),
            AppointmentStatus::RescheduleRequested => Some(Transition::RequestReschedule),
            AppointmentStatus::Pending | AppointmentStatus::Rescheduled => None,
        }
    }
}

pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Statuses a transition may start from. Legacy `RESCHEDULED` is folded
    /// into `PENDING` before the lookup.
    pub fn allowed_sources(&self, transition: Transition) -> &'static [AppointmentStatus] {
        use AppointmentStatus::*;
        match transition {
            Transition::Confirm => &[Pending],
            Transition::Cancel | Transition::Reschedule => &[Pending, Confirmed, RescheduleRequested],
            Transition::Conclude | Transition::RequestReschedule => &[Pending, Confirmed],
        }
    }

    pub fn allowed_roles(&self, transition: Transition) -> &'static [Role] {
        match transition {
            Transition::Confirm => &[Role::Admin, Role::Secretary, Role::Doctor],
            Transition::Cancel | Transition::Reschedule => {
                &[Role::Admin, Role::Secretary, Role::Doctor, Role::Patient]
            }
            Transition::Conclude | Transition::RequestReschedule => &[Role::Doctor],
        }
    }

    pub fn valid_transitions(&self, current: AppointmentStatus) -> Vec<Transition> {
        if current.is_terminal() {
            return vec![];
        }
        Transition::ALL
            .into_iter()
            .filter(|t| self.allowed_sources(*t).contains(&current.normalized()))
            .collect()
    }

    /// Checks role, ownership and source status. Returns the status the
    /// appointment moves to.
    pub fn validate(
        &self,
        actor: &Actor,
        appointment: &Appointment,
        transition: Transition,
    ) -> Result<AppointmentStatus, AppointmentError> {
        debug!(
            "Validating {:?} of appointment {} ({}) by {}",
            transition,
            appointment.id,
            appointment.status,
            actor.role()
        );

        if !self.allowed_roles(transition).contains(&actor.role()) {
            warn!("{} attempted to {} appointment {}", actor.role(), transition.verb(), appointment.id);
            return Err(AppointmentError::Forbidden(format!(
                "A {} cannot {} appointments",
                actor.role().to_string().to_lowercase(),
                transition.verb()
            )));
        }

        match actor {
            Actor::Doctor { user_id, .. }
                if matches!(transition, Transition::Conclude | Transition::RequestReschedule)
                    && appointment.doctor_id != *user_id =>
            {
                return Err(AppointmentError::NotFound("Appointment"));
            }
            Actor::Patient { patient_id, .. } if appointment.patient_id != *patient_id => {
                return Err(AppointmentError::NotFound("Appointment"));
            }
            _ => {}
        }

        let current = appointment.status;
        if current.is_terminal() {
            warn!("Rejected {:?} on terminal appointment {}", transition, appointment.id);
            return Err(RuleViolation::Terminal(current).into());
        }

        if !self.allowed_sources(transition).contains(&current.normalized()) {
            warn!("Invalid status transition attempted: {} via {:?}", current, transition);
            return Err(RuleViolation::TransitionNotAllowed {
                action: transition.verb(),
                from: current,
            }
            .into());
        }

        let target = transition.target();
        info!("Status transition validated: {} -> {}", current, target);
        Ok(target)
    }
}

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn appointment(status: AppointmentStatus, doctor_id: Uuid, patient_id: Uuid) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            patient_id,
            doctor_id,
            clinic_id: Uuid::new_v4(),
            scheduled_at: Utc::now(),
            status,
            value: Decimal::ZERO,
            patient_reschedule_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn secretary() -> Actor {
        Actor::Secretary { user_id: Uuid::new_v4(), clinic_id: Uuid::new_v4() }
    }

    #[test]
    fn terminal_statuses_have_no_transitions() {
        let lifecycle = AppointmentLifecycleService::new();
        assert!(lifecycle.valid_transitions(AppointmentStatus::Cancelled).is_empty());
        assert!(lifecycle.valid_transitions(AppointmentStatus::Concluded).is_empty());
        assert_eq!(
            lifecycle.valid_transitions(AppointmentStatus::Rescheduled),
            lifecycle.valid_transitions(AppointmentStatus::Pending)
        );
    }

    #[test]
    fn confirming_a_cancelled_appointment_is_a_terminal_violation() {
        let lifecycle = AppointmentLifecycleService::new();
        let cancelled = appointment(AppointmentStatus::Cancelled, Uuid::new_v4(), Uuid::new_v4());

        let result = lifecycle.validate(&secretary(), &cancelled, Transition::Confirm);

        assert_matches!(
            result,
            Err(AppointmentError::Rule(RuleViolation::Terminal(AppointmentStatus::Cancelled)))
        );
    }

    #[test]
    fn confirm_only_from_pending() {
        let lifecycle = AppointmentLifecycleService::new();
        let confirmed = appointment(AppointmentStatus::Confirmed, Uuid::new_v4(), Uuid::new_v4());

        assert_matches!(
            lifecycle.validate(&secretary(), &confirmed, Transition::Confirm),
            Err(AppointmentError::Rule(RuleViolation::TransitionNotAllowed { .. }))
        );
    }

    #[test]
    fn secretaries_cannot_conclude() {
        let lifecycle = AppointmentLifecycleService::new();
        let pending = appointment(AppointmentStatus::Pending, Uuid::new_v4(), Uuid::new_v4());

        assert_matches!(
            lifecycle.validate(&secretary(), &pending, Transition::Conclude),
            Err(AppointmentError::Forbidden(_))
        );
    }

    #[test]
    fn another_doctor_sees_not_found_on_doctor_only_transitions() {
        let lifecycle = AppointmentLifecycleService::new();
        let pending = appointment(AppointmentStatus::Confirmed, Uuid::new_v4(), Uuid::new_v4());
        let stranger = Actor::Doctor { user_id: Uuid::new_v4(), clinic_ids: vec![pending.clinic_id] };

        assert_matches!(
            lifecycle.validate(&stranger, &pending, Transition::Conclude),
            Err(AppointmentError::NotFound(_))
        );
        assert_matches!(
            lifecycle.validate(&stranger, &pending, Transition::RequestReschedule),
            Err(AppointmentError::NotFound(_))
        );
    }

    #[test]
    fn assigned_doctor_concludes_confirmed_appointment() {
        let lifecycle = AppointmentLifecycleService::new();
        let doctor_id = Uuid::new_v4();
        let confirmed = appointment(AppointmentStatus::Confirmed, doctor_id, Uuid::new_v4());
        let doctor = Actor::Doctor { user_id: doctor_id, clinic_ids: vec![] };

        assert_eq!(
            lifecycle.validate(&doctor, &confirmed, Transition::Conclude).unwrap(),
            AppointmentStatus::Concluded
        );
    }

    #[test]
    fn direct_status_targets_map_to_transitions() {
        assert_eq!(Transition::for_target(AppointmentStatus::Confirmed), Some(Transition::Confirm));
        assert_eq!(Transition::for_target(AppointmentStatus::Pending), None);
    }
}
