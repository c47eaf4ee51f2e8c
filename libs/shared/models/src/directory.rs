use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::actor::Role;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserAccount {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub cpf: String,
    pub role: Role,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Clinic {
    pub id: Uuid,
    pub trade_name: String,
    pub cnpj: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Specialty {
    #[serde(alias = "CLINICO_GERAL")]
    GeneralPractice,
    #[serde(alias = "PEDIATRIA")]
    Pediatrics,
    #[serde(alias = "CARDIOLOGIA")]
    Cardiology,
    #[serde(alias = "DERMATOLOGIA")]
    Dermatology,
    #[serde(alias = "GINECOLOGIA")]
    Gynecology,
    #[serde(alias = "ORTOPEDIA")]
    Orthopedics,
    #[serde(alias = "PSIQUIATRIA")]
    Psychiatry,
    #[serde(alias = "OFTALMOLOGIA")]
    Ophthalmology,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DoctorProfile {
    pub user_id: Uuid,
    pub crm: String,
    pub specialty: Specialty,
    pub consultation_fee: Decimal,
    #[serde(default)]
    pub clinic_ids: Vec<Uuid>,
}

impl DoctorProfile {
    pub fn works_at(&self, clinic_id: Uuid) -> bool {
        self.clinic_ids.contains(&clinic_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SecretaryProfile {
    pub user_id: Uuid,
    pub clinic_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub phone: Option<String>,
    pub clinic_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdminProfile {
    pub user_id: Uuid,
    pub clinic_id: Option<Uuid>,
}

/// The role-specific half of an account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoleProfile {
    Admin(AdminProfile),
    Secretary(SecretaryProfile),
    Doctor(DoctorProfile),
    Patient(PatientProfile),
}

impl RoleProfile {
    pub fn role(&self) -> Role {
        match self {
            RoleProfile::Admin(_) => Role::Admin,
            RoleProfile::Secretary(_) => Role::Secretary,
            RoleProfile::Doctor(_) => Role::Doctor,
            RoleProfile::Patient(_) => Role::Patient,
        }
    }

    pub fn user_id(&self) -> Uuid {
        match self {
            RoleProfile::Admin(p) => p.user_id,
            RoleProfile::Secretary(p) => p.user_id,
            RoleProfile::Doctor(p) => p.user_id,
            RoleProfile::Patient(p) => p.user_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdminAction {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdminLogEntry {
    pub id: Uuid,
    pub actor_id: Option<Uuid>,
    pub action_type: AdminAction,
    pub details: String,
    pub created_at: DateTime<Utc>,
}

/// Everything written by one account provisioning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountBundle {
    pub account: UserAccount,
    pub profile: RoleProfile,
    pub log_entry: AdminLogEntry,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminLogQuery {
    pub actor_id: Option<Uuid>,
    pub action_type: Option<AdminAction>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}
