use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use shared_database::directory::DirectoryStore;
use shared_models::directory::Clinic;

use crate::error::AppointmentError;
use crate::models::{AppointmentRecord, AppointmentView, DoctorSummary, PatientSummary};

/// Attaches patient, doctor and clinic summaries to appointment records.
/// Directory lookups are cached per presenter, so a listing reads each
/// distinct party once.
pub struct AppointmentPresenter {
    directory: Arc<dyn DirectoryStore>,
    patients: HashMap<Uuid, Option<PatientSummary>>,
    doctors: HashMap<Uuid, Option<DoctorSummary>>,
    clinics: HashMap<Uuid, Option<Clinic>>,
}

impl AppointmentPresenter {
    pub fn new(directory: Arc<dyn DirectoryStore>) -> Self {
        Self {
            directory,
            patients: HashMap::new(),
            doctors: HashMap::new(),
            clinics: HashMap::new(),
        }
    }

    pub async fn present(&mut self, record: AppointmentRecord) -> Result<AppointmentView, AppointmentError> {
        let patient = self.patient(record.appointment.patient_id).await?;
        let doctor = self.doctor(record.appointment.doctor_id).await?;
        let clinic = self.clinic(record.appointment.clinic_id).await?;

        Ok(AppointmentView { record, patient, doctor, clinic })
    }

    pub async fn present_all(
        &mut self,
        records: Vec<AppointmentRecord>,
    ) -> Result<Vec<AppointmentView>, AppointmentError> {
        let mut views = Vec::with_capacity(records.len());
        for record in records {
            views.push(self.present(record).await?);
        }
        Ok(views)
    }

    async fn patient(&mut self, patient_id: Uuid) -> Result<Option<PatientSummary>, AppointmentError> {
        if let Some(cached) = self.patients.get(&patient_id) {
            return Ok(cached.clone());
        }

        let summary = match self.directory.find_patient(patient_id).await? {
            Some(profile) => self
                .directory
                .find_account(profile.user_id)
                .await?
                .map(|account| PatientSummary {
                    id: profile.id,
                    user_id: account.id,
                    full_name: account.full_name,
                    cpf: account.cpf,
                }),
            None => {
                debug!("Patient {} missing from directory", patient_id);
                None
            }
        };

        self.patients.insert(patient_id, summary.clone());
        Ok(summary)
    }

    async fn doctor(&mut self, doctor_id: Uuid) -> Result<Option<DoctorSummary>, AppointmentError> {
        if let Some(cached) = self.doctors.get(&doctor_id) {
            return Ok(cached.clone());
        }

        let summary = match self.directory.find_account(doctor_id).await? {
            Some(account) => {
                let profile = self.directory.find_doctor(doctor_id).await?;
                Some(DoctorSummary {
                    user_id: account.id,
                    full_name: account.full_name,
                    email: account.email,
                    crm: profile.as_ref().map(|p| p.crm.clone()),
                    specialty: profile.map(|p| p.specialty),
                })
            }
            None => {
                debug!("Doctor {} missing from directory", doctor_id);
                None
            }
        };

        self.doctors.insert(doctor_id, summary.clone());
        Ok(summary)
    }

    async fn clinic(&mut self, clinic_id: Uuid) -> Result<Option<Clinic>, AppointmentError> {
        if let Some(cached) = self.clinics.get(&clinic_id) {
            return Ok(cached.clone());
        }

        let clinic = self.directory.find_clinic(clinic_id).await?;
        self.clinics.insert(clinic_id, clinic.clone());
        Ok(clinic)
    }
}
