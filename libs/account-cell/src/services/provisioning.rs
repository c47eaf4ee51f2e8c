use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_models::actor::{Actor, Role};
use shared_models::directory::{
    AccountBundle, AdminAction, AdminLogEntry, AdminLogQuery, AdminProfile, DoctorProfile,
    PatientProfile, RoleProfile, SecretaryProfile, UserAccount,
};

use crate::error::AccountError;
use crate::models::{CreateAccountRequest, ProvisionedAccount};
use crate::state::AccountState;

const DEFAULT_LOG_PAGE: usize = 50;
const MAX_LOG_PAGE: usize = 200;

pub struct AccountProvisioningService<'a> {
    state: &'a AccountState,
}

impl<'a> AccountProvisioningService<'a> {
    pub fn new(state: &'a AccountState) -> Self {
        Self { state }
    }

    /// Creates the account, its role profile and a `CREATE` admin log entry in
    /// one directory transaction.
    pub async fn provision(
        &self,
        actor: &Actor,
        request: CreateAccountRequest,
    ) -> Result<ProvisionedAccount, AccountError> {
        let Actor::Admin { user_id: admin_id, clinic_id: admin_clinic } = actor else {
            return Err(AccountError::Forbidden("Only administrators can create accounts".to_string()));
        };

        let validator = &self.state.validator;
        let email = validator.normalize_email(&request.email)?;
        let cpf = validator.normalize_cpf(&request.cpf)?;
        let full_name = request.full_name.trim().to_string();
        if full_name.is_empty() {
            return Err(AccountError::Validation("full_name is required".to_string()));
        }

        debug!("Provisioning {} account for {}", request.role, email);

        if self.state.directory.account_taken(&email, &cpf).await? {
            warn!("Rejected duplicate account for {}", email);
            return Err(AccountError::Duplicate("Email or CPF already registered".to_string()));
        }

        let user_id = request.user_id.unwrap_or_else(Uuid::new_v4);
        let profile = self.build_profile(user_id, *admin_clinic, &request).await?;

        let now = self.state.clock.now();
        let account = UserAccount {
            id: user_id,
            email: email.clone(),
            full_name,
            cpf,
            role: request.role,
            is_active: true,
            created_at: now,
        };
        let log_entry = AdminLogEntry {
            id: Uuid::new_v4(),
            actor_id: Some(*admin_id),
            action_type: AdminAction::Create,
            details: format!("Created {} account {} ({})", request.role, email, user_id),
            created_at: now,
        };

        self.state
            .directory
            .provision_account(AccountBundle {
                account: account.clone(),
                profile: profile.clone(),
                log_entry,
            })
            .await?;

        info!("Account {} provisioned as {} by {}", user_id, request.role, admin_id);
        Ok(ProvisionedAccount { account, profile })
    }

    /// Newest first. Clinic administrators only see their own entries.
    pub async fn admin_log(&self, actor: &Actor, mut query: AdminLogQuery) -> Result<Vec<AdminLogEntry>, AccountError> {
        let Actor::Admin { user_id, clinic_id } = actor else {
            return Err(AccountError::Forbidden("Only administrators can read the admin log".to_string()));
        };

        if clinic_id.is_some() {
            query.actor_id = Some(*user_id);
        }
        query.limit = Some(query.limit.unwrap_or(DEFAULT_LOG_PAGE).min(MAX_LOG_PAGE));

        Ok(self.state.directory.admin_log(&query).await?)
    }

    async fn build_profile(
        &self,
        user_id: Uuid,
        admin_clinic: Option<Uuid>,
        request: &CreateAccountRequest,
    ) -> Result<RoleProfile, AccountError> {
        match request.role {
            Role::Doctor => {
                let crm = request
                    .crm
                    .as_deref()
                    .ok_or_else(|| AccountError::Validation("crm is required for doctors".to_string()))?;
                let specialty = request
                    .specialty
                    .ok_or_else(|| AccountError::Validation("specialty is required for doctors".to_string()))?;
                let consultation_fee = request.consultation_fee.unwrap_or(Decimal::ZERO);
                if consultation_fee.is_sign_negative() {
                    return Err(AccountError::Validation("consultation_fee cannot be negative".to_string()));
                }

                let clinic_ids = if request.clinic_ids.is_empty() {
                    admin_clinic.into_iter().collect()
                } else {
                    request.clinic_ids.clone()
                };
                for clinic_id in &clinic_ids {
                    self.ensure_clinic(*clinic_id, admin_clinic).await?;
                }

                Ok(RoleProfile::Doctor(DoctorProfile {
                    user_id,
                    crm: self.state.validator.normalize_crm(crm)?,
                    specialty,
                    consultation_fee,
                    clinic_ids,
                }))
            }
            Role::Secretary => {
                let clinic_id = request
                    .clinic_id
                    .or(admin_clinic)
                    .ok_or_else(|| AccountError::Validation("clinic_id is required for secretaries".to_string()))?;
                self.ensure_clinic(clinic_id, admin_clinic).await?;

                Ok(RoleProfile::Secretary(SecretaryProfile { user_id, clinic_id }))
            }
            Role::Admin => {
                let clinic_id = request.clinic_id.or(admin_clinic);
                match clinic_id {
                    Some(clinic_id) => self.ensure_clinic(clinic_id, admin_clinic).await?,
                    // Platform administrators can only be created by another one
                    None if admin_clinic.is_some() => {
                        return Err(AccountError::Forbidden(
                            "Clinic administrators cannot create platform administrators".to_string(),
                        ))
                    }
                    None => {}
                }

                Ok(RoleProfile::Admin(AdminProfile { user_id, clinic_id }))
            }
            Role::Patient => {
                let clinic_id = request.clinic_id.or(admin_clinic);
                if let Some(clinic_id) = clinic_id {
                    self.ensure_clinic(clinic_id, admin_clinic).await?;
                }

                Ok(RoleProfile::Patient(PatientProfile {
                    id: Uuid::new_v4(),
                    user_id,
                    phone: request.phone.clone(),
                    clinic_id,
                }))
            }
        }
    }

    /// The clinic must exist and, for a clinic administrator, be their own.
    async fn ensure_clinic(&self, clinic_id: Uuid, admin_clinic: Option<Uuid>) -> Result<(), AccountError> {
        if admin_clinic.is_some_and(|own| own != clinic_id) {
            return Err(AccountError::Forbidden(
                "Clinic administrators can only create accounts for their own clinic".to_string(),
            ));
        }

        self.state
            .directory
            .find_clinic(clinic_id)
            .await?
            .ok_or(AccountError::NotFound("Clinic"))?;
        Ok(())
    }
}
