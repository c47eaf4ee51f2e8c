use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, instrument};
use uuid::Uuid;

use shared_models::actor::Role;
use shared_models::directory::{
    AccountBundle, AdminLogEntry, AdminLogQuery, AdminProfile, Clinic, DoctorProfile,
    PatientProfile, RoleProfile, SecretaryProfile, Specialty, UserAccount,
};

use super::{DirectoryError, DirectoryStore};
use crate::supabase::SupabaseClient;

const DOCTOR_SELECT: &str = "select=user_id,crm,specialty,consultation_fee,doctor_clinics(clinic_id)";

#[derive(Debug, Deserialize)]
struct DoctorRow {
    user_id: Uuid,
    crm: String,
    specialty: Specialty,
    consultation_fee: Decimal,
    #[serde(default)]
    doctor_clinics: Vec<ClinicLink>,
}

#[derive(Debug, Deserialize)]
struct ClinicLink {
    clinic_id: Uuid,
}

impl From<DoctorRow> for DoctorProfile {
    fn from(row: DoctorRow) -> Self {
        DoctorProfile {
            user_id: row.user_id,
            crm: row.crm,
            specialty: row.specialty,
            consultation_fee: row.consultation_fee,
            clinic_ids: row.doctor_clinics.into_iter().map(|link| link.clinic_id).collect(),
        }
    }
}

/// Directory backed by the PostgREST tables `users`, `doctors`,
/// `doctor_clinics`, `secretaries`, `patients`, `clinic_admins`, `clinics`
/// and `admin_log_entries`.
pub struct SupabaseDirectory {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseDirectory {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn first<T>(&self, table: &str, query: &str) -> Result<Option<T>, DirectoryError>
    where
        T: serde::de::DeserializeOwned,
    {
        let rows: Vec<T> = self
            .supabase
            .select(table, query)
            .await
            .map_err(|e| DirectoryError::Storage(e.to_string()))?;
        Ok(rows.into_iter().next())
    }
}

#[async_trait]
impl DirectoryStore for SupabaseDirectory {
    async fn find_account(&self, user_id: Uuid) -> Result<Option<UserAccount>, DirectoryError> {
        debug!("Fetching account {}", user_id);
        self.first("users", &format!("id=eq.{}", user_id)).await
    }

    async fn find_profile(&self, user_id: Uuid, role: Role) -> Result<Option<RoleProfile>, DirectoryError> {
        let query = format!("user_id=eq.{}", user_id);
        let profile = match role {
            Role::Admin => self
                .first::<AdminProfile>("clinic_admins", &query)
                .await?
                .map(RoleProfile::Admin),
            Role::Secretary => self
                .first::<SecretaryProfile>("secretaries", &query)
                .await?
                .map(RoleProfile::Secretary),
            Role::Doctor => self.find_doctor(user_id).await?.map(RoleProfile::Doctor),
            Role::Patient => self
                .first::<PatientProfile>("patients", &query)
                .await?
                .map(RoleProfile::Patient),
        };
        Ok(profile)
    }

    async fn find_doctor(&self, user_id: Uuid) -> Result<Option<DoctorProfile>, DirectoryError> {
        let row: Option<DoctorRow> = self
            .first("doctors", &format!("user_id=eq.{}&{}", user_id, DOCTOR_SELECT))
            .await?;
        Ok(row.map(DoctorProfile::from))
    }

    async fn find_patient(&self, patient_id: Uuid) -> Result<Option<PatientProfile>, DirectoryError> {
        self.first("patients", &format!("id=eq.{}", patient_id)).await
    }

    async fn find_clinic(&self, clinic_id: Uuid) -> Result<Option<Clinic>, DirectoryError> {
        self.first("clinics", &format!("id=eq.{}", clinic_id)).await
    }

    async fn account_taken(&self, email: &str, cpf: &str) -> Result<bool, DirectoryError> {
        let query = format!(
            "select=id&or=(email.ilike.{},cpf.eq.{})",
            urlencoding::encode(email),
            urlencoding::encode(cpf)
        );
        let existing: Option<Value> = self.first("users", &query).await?;
        Ok(existing.is_some())
    }

    #[instrument(skip(self, bundle), fields(user_id = %bundle.account.id))]
    async fn provision_account(&self, bundle: AccountBundle) -> Result<(), DirectoryError> {
        let result: Value = self
            .supabase
            .rpc("provision_account", json!({ "payload": bundle }))
            .await
            .map_err(|e| {
                error!("Account provisioning failed: {}", e);
                DirectoryError::Storage(e.to_string())
            })?;

        match result.get("status").and_then(Value::as_str) {
            Some("created") => Ok(()),
            Some("duplicate") => Err(DirectoryError::Duplicate(
                "An account with this email or CPF already exists".to_string(),
            )),
            other => Err(DirectoryError::Storage(format!(
                "unexpected provisioning result: {:?}",
                other
            ))),
        }
    }

    async fn admin_log(&self, query: &AdminLogQuery) -> Result<Vec<AdminLogEntry>, DirectoryError> {
        let mut parts = vec!["order=created_at.desc".to_string()];

        if let Some(actor_id) = query.actor_id {
            parts.push(format!("actor_id=eq.{}", actor_id));
        }
        if let Some(action) = query.action_type {
            let label = serde_json::to_value(action)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            parts.push(format!("action_type=eq.{}", label));
        }
        if let Some(limit) = query.limit {
            parts.push(format!("limit={}", limit));
        }
        if let Some(offset) = query.offset {
            parts.push(format!("offset={}", offset));
        }

        self.supabase
            .select("admin_log_entries", &parts.join("&"))
            .await
            .map_err(|e| DirectoryError::Storage(e.to_string()))
    }
}
