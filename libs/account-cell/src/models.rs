use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::actor::Role;
use shared_models::directory::{RoleProfile, Specialty, UserAccount};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccountRequest {
    /// Id issued by the identity provider. Generated when absent.
    pub user_id: Option<Uuid>,
    pub email: String,
    pub full_name: String,
    pub cpf: String,
    pub role: Role,

    /// Secretary, clinic admin and (optionally) patient clinic.
    pub clinic_id: Option<Uuid>,

    // Doctor fields
    pub crm: Option<String>,
    pub specialty: Option<Specialty>,
    pub consultation_fee: Option<Decimal>,
    #[serde(default)]
    pub clinic_ids: Vec<Uuid>,

    // Patient fields
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProvisionedAccount {
    pub account: UserAccount,
    pub profile: RoleProfile,
}
