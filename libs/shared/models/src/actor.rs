use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    #[serde(alias = "ADMINISTRADOR")]
    Admin,
    #[serde(alias = "SECRETARIA")]
    Secretary,
    #[serde(alias = "MEDICO")]
    Doctor,
    #[serde(alias = "PACIENTE")]
    Patient,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Role::Admin => "ADMIN",
            Role::Secretary => "SECRETARY",
            Role::Doctor => "DOCTOR",
            Role::Patient => "PATIENT",
        };
        f.write_str(label)
    }
}

/// The caller of a request, resolved once from the directory after the
/// bearer token is validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    /// `clinic_id` is `None` for platform administrators.
    Admin { user_id: Uuid, clinic_id: Option<Uuid> },
    Secretary { user_id: Uuid, clinic_id: Uuid },
    Doctor { user_id: Uuid, clinic_ids: Vec<Uuid> },
    Patient { user_id: Uuid, patient_id: Uuid },
}

/// Which appointments an actor may see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    Everything,
    Clinic(Uuid),
    /// Appointments in any of the clinics, plus those assigned to the doctor.
    ClinicsOrDoctor { clinic_ids: Vec<Uuid>, doctor_id: Uuid },
    Doctor(Uuid),
    Patient(Uuid),
}

impl Visibility {
    pub fn admits(&self, clinic_id: Uuid, doctor_id: Uuid, patient_id: Uuid) -> bool {
        match self {
            Visibility::Everything => true,
            Visibility::Clinic(id) => *id == clinic_id,
            Visibility::ClinicsOrDoctor { clinic_ids, doctor_id: own } => {
                *own == doctor_id || clinic_ids.contains(&clinic_id)
            }
            Visibility::Doctor(id) => *id == doctor_id,
            Visibility::Patient(id) => *id == patient_id,
        }
    }
}

impl Actor {
    pub fn user_id(&self) -> Uuid {
        match self {
            Actor::Admin { user_id, .. }
            | Actor::Secretary { user_id, .. }
            | Actor::Doctor { user_id, .. }
            | Actor::Patient { user_id, .. } => *user_id,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Actor::Admin { .. } => Role::Admin,
            Actor::Secretary { .. } => Role::Secretary,
            Actor::Doctor { .. } => Role::Doctor,
            Actor::Patient { .. } => Role::Patient,
        }
    }

    pub fn is_staff(&self) -> bool {
        !matches!(self, Actor::Patient { .. })
    }

    /// Scope used for reading and mutating appointments.
    pub fn visibility(&self) -> Visibility {
        match self {
            Actor::Admin { clinic_id: None, .. } => Visibility::Everything,
            Actor::Admin { clinic_id: Some(clinic_id), .. } => Visibility::Clinic(*clinic_id),
            Actor::Secretary { clinic_id, .. } => Visibility::Clinic(*clinic_id),
            Actor::Doctor { user_id, clinic_ids } => Visibility::ClinicsOrDoctor {
                clinic_ids: clinic_ids.clone(),
                doctor_id: *user_id,
            },
            Actor::Patient { patient_id, .. } => Visibility::Patient(*patient_id),
        }
    }

    /// Scope used by the administrative audit view. Doctors only see the
    /// trail of appointments assigned to them; patients get nothing.
    pub fn audit_visibility(&self) -> Option<Visibility> {
        match self {
            Actor::Doctor { user_id, .. } => Some(Visibility::Doctor(*user_id)),
            Actor::Patient { .. } => None,
            other => Some(other.visibility()),
        }
    }

    /// Whether the actor may act on behalf of the given clinic.
    pub fn serves_clinic(&self, clinic_id: Uuid) -> bool {
        match self {
            Actor::Admin { clinic_id: None, .. } => true,
            Actor::Admin { clinic_id: Some(own), .. } => *own == clinic_id,
            Actor::Secretary { clinic_id: own, .. } => *own == clinic_id,
            Actor::Doctor { clinic_ids, .. } => clinic_ids.contains(&clinic_id),
            Actor::Patient { .. } => false,
        }
    }
}
