use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_models::actor::{Actor, Role};
use shared_models::directory::{
    AccountBundle, AdminLogEntry, AdminLogQuery, Clinic, DoctorProfile, PatientProfile,
    RoleProfile, UserAccount,
};
use shared_models::error::AppError;

mod memory;
mod supabase;

pub use memory::{DirectorySeed, MemoryDirectory, SeedAccount};
pub use supabase::SupabaseDirectory;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Unknown user {0}")]
    UnknownUser(Uuid),

    #[error("User {0} is inactive")]
    InactiveUser(Uuid),

    #[error("User {user_id} has no {role} profile")]
    MissingProfile { user_id: Uuid, role: Role },

    #[error("{0}")]
    Duplicate(String),

    #[error("Directory storage error: {0}")]
    Storage(String),
}

impl From<DirectoryError> for AppError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::UnknownUser(_)
            | DirectoryError::InactiveUser(_)
            | DirectoryError::MissingProfile { .. } => AppError::Forbidden(err.to_string()),
            DirectoryError::Duplicate(msg) => AppError::Conflict(msg),
            DirectoryError::Storage(msg) => AppError::Database(msg),
        }
    }
}

/// Read access to users, role profiles and clinics, plus the transactional
/// account provisioning used by administrators.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    async fn find_account(&self, user_id: Uuid) -> Result<Option<UserAccount>, DirectoryError>;

    async fn find_profile(&self, user_id: Uuid, role: Role) -> Result<Option<RoleProfile>, DirectoryError>;

    async fn find_doctor(&self, user_id: Uuid) -> Result<Option<DoctorProfile>, DirectoryError>;

    /// Looks a patient up by profile id, not user id.
    async fn find_patient(&self, patient_id: Uuid) -> Result<Option<PatientProfile>, DirectoryError>;

    async fn find_clinic(&self, clinic_id: Uuid) -> Result<Option<Clinic>, DirectoryError>;

    async fn account_taken(&self, email: &str, cpf: &str) -> Result<bool, DirectoryError>;

    /// Writes the account, its role profile and the admin log entry in one
    /// transaction. Nothing is written when any part fails.
    async fn provision_account(&self, bundle: AccountBundle) -> Result<(), DirectoryError>;

    async fn admin_log(&self, query: &AdminLogQuery) -> Result<Vec<AdminLogEntry>, DirectoryError>;

    async fn resolve_actor(&self, user_id: Uuid) -> Result<Actor, DirectoryError> {
        let account = self
            .find_account(user_id)
            .await?
            .ok_or(DirectoryError::UnknownUser(user_id))?;

        if !account.is_active {
            warn!("Inactive user {} attempted a request", user_id);
            return Err(DirectoryError::InactiveUser(user_id));
        }

        let profile = self
            .find_profile(user_id, account.role)
            .await?
            .ok_or(DirectoryError::MissingProfile { user_id, role: account.role })?;

        let actor = match profile {
            RoleProfile::Admin(admin) => Actor::Admin { user_id, clinic_id: admin.clinic_id },
            RoleProfile::Secretary(secretary) => Actor::Secretary { user_id, clinic_id: secretary.clinic_id },
            RoleProfile::Doctor(doctor) => Actor::Doctor { user_id, clinic_ids: doctor.clinic_ids },
            RoleProfile::Patient(patient) => Actor::Patient { user_id, patient_id: patient.id },
        };

        debug!("Resolved user {} as {}", user_id, actor.role());
        Ok(actor)
    }
}
