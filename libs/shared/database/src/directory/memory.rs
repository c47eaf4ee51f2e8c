use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, instrument};
use uuid::Uuid;

use shared_models::actor::Role;
use shared_models::directory::{
    AccountBundle, AdminLogEntry, AdminLogQuery, Clinic, DoctorProfile, PatientProfile,
    RoleProfile, UserAccount,
};

use super::{DirectoryError, DirectoryStore};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedAccount {
    pub account: UserAccount,
    pub profile: RoleProfile,
}

/// JSON document used to populate the in-memory directory at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectorySeed {
    #[serde(default)]
    pub clinics: Vec<Clinic>,
    #[serde(default)]
    pub accounts: Vec<SeedAccount>,
}

#[derive(Default)]
struct DirectoryTables {
    accounts: HashMap<Uuid, UserAccount>,
    profiles: HashMap<Uuid, RoleProfile>,
    clinics: HashMap<Uuid, Clinic>,
    admin_log: Vec<AdminLogEntry>,
}

#[derive(Default)]
pub struct MemoryDirectory {
    tables: RwLock<DirectoryTables>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: DirectorySeed) -> Self {
        let mut tables = DirectoryTables::default();

        for clinic in seed.clinics {
            tables.clinics.insert(clinic.id, clinic);
        }
        for SeedAccount { account, profile } in seed.accounts {
            tables.profiles.insert(account.id, profile);
            tables.accounts.insert(account.id, account);
        }

        Self { tables: RwLock::new(tables) }
    }

    pub fn load_seed(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading directory seed {}", path.display()))?;
        let seed: DirectorySeed = serde_json::from_str(&raw)
            .with_context(|| format!("parsing directory seed {}", path.display()))?;

        info!(
            "Loaded directory seed with {} clinics and {} accounts",
            seed.clinics.len(),
            seed.accounts.len()
        );
        Ok(Self::from_seed(seed))
    }

    pub async fn insert_clinic(&self, clinic: Clinic) {
        self.tables.write().await.clinics.insert(clinic.id, clinic);
    }

    /// Inserts an account without the admin log entry. Used for fixtures.
    pub async fn insert_account(&self, account: UserAccount, profile: RoleProfile) {
        let mut tables = self.tables.write().await;
        tables.profiles.insert(account.id, profile);
        tables.accounts.insert(account.id, account);
    }
}

#[async_trait]
impl DirectoryStore for MemoryDirectory {
    async fn find_account(&self, user_id: Uuid) -> Result<Option<UserAccount>, DirectoryError> {
        Ok(self.tables.read().await.accounts.get(&user_id).cloned())
    }

    async fn find_profile(&self, user_id: Uuid, role: Role) -> Result<Option<RoleProfile>, DirectoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .profiles
            .get(&user_id)
            .filter(|profile| profile.role() == role)
            .cloned())
    }

    async fn find_doctor(&self, user_id: Uuid) -> Result<Option<DoctorProfile>, DirectoryError> {
        let tables = self.tables.read().await;
        Ok(match tables.profiles.get(&user_id) {
            Some(RoleProfile::Doctor(doctor)) => Some(doctor.clone()),
            _ => None,
        })
    }

    async fn find_patient(&self, patient_id: Uuid) -> Result<Option<PatientProfile>, DirectoryError> {
        let tables = self.tables.read().await;
        Ok(tables.profiles.values().find_map(|profile| match profile {
            RoleProfile::Patient(patient) if patient.id == patient_id => Some(patient.clone()),
            _ => None,
        }))
    }

    async fn find_clinic(&self, clinic_id: Uuid) -> Result<Option<Clinic>, DirectoryError> {
        Ok(self.tables.read().await.clinics.get(&clinic_id).cloned())
    }

    async fn account_taken(&self, email: &str, cpf: &str) -> Result<bool, DirectoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .accounts
            .values()
            .any(|account| account.email.eq_ignore_ascii_case(email) || account.cpf == cpf))
    }

    #[instrument(skip(self, bundle), fields(user_id = %bundle.account.id))]
    async fn provision_account(&self, bundle: AccountBundle) -> Result<(), DirectoryError> {
        let mut tables = self.tables.write().await;

        let AccountBundle { account, profile, log_entry } = bundle;

        if profile.user_id() != account.id || profile.role() != account.role {
            return Err(DirectoryError::Storage(
                "profile does not belong to the provisioned account".to_string(),
            ));
        }

        // Re-checked under the write lock so concurrent provisioning cannot
        // create two accounts with the same identity.
        let duplicate = tables.accounts.values().any(|existing| {
            existing.id == account.id
                || existing.email.eq_ignore_ascii_case(&account.email)
                || existing.cpf == account.cpf
        });
        if duplicate {
            return Err(DirectoryError::Duplicate(
                "An account with this email or CPF already exists".to_string(),
            ));
        }

        tables.profiles.insert(account.id, profile);
        tables.accounts.insert(account.id, account);
        tables.admin_log.push(log_entry);
        Ok(())
    }

    async fn admin_log(&self, query: &AdminLogQuery) -> Result<Vec<AdminLogEntry>, DirectoryError> {
        let tables = self.tables.read().await;

        let mut entries: Vec<AdminLogEntry> = tables
            .admin_log
            .iter()
            .filter(|entry| query.actor_id.map_or(true, |actor| entry.actor_id == Some(actor)))
            .filter(|entry| query.action_type.map_or(true, |action| entry.action_type == action))
            .cloned()
            .collect();

        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(entries
            .into_iter()
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .collect())
    }
}
