use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

use shared_config::{AppConfig, SchedulingConfig, StorageBackend};
use shared_database::directory::MemoryDirectory;
use shared_models::actor::Role;
use shared_models::auth::User;
use shared_models::directory::{
    AdminProfile, Clinic, DoctorProfile, PatientProfile, RoleProfile, SecretaryProfile, Specialty,
    UserAccount,
};

use crate::jwt::encode_hs256;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    pub scheduling: SchedulingConfig,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            supabase_service_role_key: "test-service-role-key".to_string(),
            scheduling: SchedulingConfig::default(),
        }
    }
}

impl TestConfig {
    pub fn with_supabase_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_service_role_key: self.supabase_service_role_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            storage_backend: StorageBackend::Memory,
            directory_seed_path: None,
            port: 3000,
            scheduling: self.scheduling.clone(),
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

impl TestUser {
    pub fn new(email: &str, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.to_string(),
            role,
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, Role::Doctor)
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, Role::Patient)
    }

    pub fn secretary(email: &str) -> Self {
        Self::new(email, Role::Secretary)
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, Role::Admin)
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.to_string(),
            email: Some(self.email.clone()),
            role: Some(self.role.to_string()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }

    pub fn account(&self, full_name: &str, cpf: &str) -> UserAccount {
        UserAccount {
            id: self.id,
            email: self.email.clone(),
            full_name: full_name.to_string(),
            cpf: cpf.to_string(),
            role: self.role,
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role.to_string(),
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        encode_hs256(&payload, secret).expect("HMAC can take key of any size")
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Two clinics with staff and patients, seeded into a memory directory.
/// `doctor` works at `clinic` only, `other_doctor` at both clinics.
pub struct ClinicFixture {
    pub clinic: Clinic,
    pub other_clinic: Clinic,
    pub admin: TestUser,
    pub clinic_admin: TestUser,
    pub secretary: TestUser,
    pub other_secretary: TestUser,
    pub doctor: TestUser,
    pub other_doctor: TestUser,
    pub patient: TestUser,
    pub patient_id: Uuid,
    pub other_patient: TestUser,
    pub other_patient_id: Uuid,
    pub consultation_fee: Decimal,
}

impl ClinicFixture {
    pub async fn seed(directory: &MemoryDirectory) -> Self {
        let clinic = Clinic {
            id: Uuid::new_v4(),
            trade_name: "Clinica Vida".to_string(),
            cnpj: Some("12345678000199".to_string()),
        };
        let other_clinic = Clinic {
            id: Uuid::new_v4(),
            trade_name: "Clinica Saude".to_string(),
            cnpj: None,
        };
        directory.insert_clinic(clinic.clone()).await;
        directory.insert_clinic(other_clinic.clone()).await;

        let fixture = Self {
            admin: TestUser::admin("root@medlink.test"),
            clinic_admin: TestUser::admin("gestor@vida.test"),
            secretary: TestUser::secretary("recepcao@vida.test"),
            other_secretary: TestUser::secretary("recepcao@saude.test"),
            doctor: TestUser::doctor("dra.lima@vida.test"),
            other_doctor: TestUser::doctor("dr.costa@saude.test"),
            patient: TestUser::patient("joao@mail.test"),
            patient_id: Uuid::new_v4(),
            other_patient: TestUser::patient("maria@mail.test"),
            other_patient_id: Uuid::new_v4(),
            consultation_fee: Decimal::new(25000, 2),
            clinic,
            other_clinic,
        };

        let accounts = vec![
            (
                fixture.admin.account("Root Admin", "00000000001"),
                RoleProfile::Admin(AdminProfile { user_id: fixture.admin.id, clinic_id: None }),
            ),
            (
                fixture.clinic_admin.account("Gestora Vida", "00000000002"),
                RoleProfile::Admin(AdminProfile {
                    user_id: fixture.clinic_admin.id,
                    clinic_id: Some(fixture.clinic.id),
                }),
            ),
            (
                fixture.secretary.account("Ana Recepcao", "00000000003"),
                RoleProfile::Secretary(SecretaryProfile {
                    user_id: fixture.secretary.id,
                    clinic_id: fixture.clinic.id,
                }),
            ),
            (
                fixture.other_secretary.account("Bia Recepcao", "00000000004"),
                RoleProfile::Secretary(SecretaryProfile {
                    user_id: fixture.other_secretary.id,
                    clinic_id: fixture.other_clinic.id,
                }),
            ),
            (
                fixture.doctor.account("Dra. Lima", "00000000005"),
                RoleProfile::Doctor(DoctorProfile {
                    user_id: fixture.doctor.id,
                    crm: "CRM-SP 123456".to_string(),
                    specialty: Specialty::Cardiology,
                    consultation_fee: fixture.consultation_fee,
                    clinic_ids: vec![fixture.clinic.id],
                }),
            ),
            (
                fixture.other_doctor.account("Dr. Costa", "00000000006"),
                RoleProfile::Doctor(DoctorProfile {
                    user_id: fixture.other_doctor.id,
                    crm: "CRM-SP 654321".to_string(),
                    specialty: Specialty::GeneralPractice,
                    consultation_fee: Decimal::new(18000, 2),
                    clinic_ids: vec![fixture.clinic.id, fixture.other_clinic.id],
                }),
            ),
            (
                fixture.patient.account("Joao Silva", "00000000007"),
                RoleProfile::Patient(PatientProfile {
                    id: fixture.patient_id,
                    user_id: fixture.patient.id,
                    phone: Some("11999990000".to_string()),
                    clinic_id: Some(fixture.clinic.id),
                }),
            ),
            (
                fixture.other_patient.account("Maria Souza", "00000000008"),
                RoleProfile::Patient(PatientProfile {
                    id: fixture.other_patient_id,
                    user_id: fixture.other_patient.id,
                    phone: None,
                    clinic_id: None,
                }),
            ),
        ];

        for (account, profile) in accounts {
            directory.insert_account(account, profile).await;
        }

        fixture
    }
}

pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn user_row(user: &TestUser, full_name: &str) -> serde_json::Value {
        json!({
            "id": user.id,
            "email": user.email,
            "full_name": full_name,
            "cpf": "12345678901",
            "role": user.role,
            "is_active": true,
            "created_at": "2025-01-01T00:00:00Z"
        })
    }

    pub fn doctor_row(user_id: Uuid, clinic_ids: &[Uuid], fee: &str) -> serde_json::Value {
        let links: Vec<_> = clinic_ids.iter().map(|id| json!({ "clinic_id": id })).collect();
        json!({
            "user_id": user_id,
            "crm": "CRM-SP 123456",
            "specialty": "CARDIOLOGIA",
            "consultation_fee": fee,
            "doctor_clinics": links
        })
    }

    pub fn patient_row(patient_id: Uuid, user_id: Uuid, clinic_id: Option<Uuid>) -> serde_json::Value {
        json!({
            "id": patient_id,
            "user_id": user_id,
            "phone": "11988887777",
            "clinic_id": clinic_id
        })
    }

    pub fn clinic_row(clinic_id: Uuid, trade_name: &str) -> serde_json::Value {
        json!({
            "id": clinic_id,
            "trade_name": trade_name,
            "cnpj": "12345678000199"
        })
    }
}
