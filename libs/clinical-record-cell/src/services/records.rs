use std::collections::{HashMap, HashSet};

use chrono::{Local, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use appointment_cell::{AppointmentBookingService, AppointmentStatus, StatusChange, Viewer};
use profile_cell::{Profile, ProfileService};
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::role::Role;

use crate::models::{
    record_from_row, AttendedPatients, ClinicalRecord, ClinicalRecordError, CreateClinicalRecordRequest,
    RecordEntry, UpdateClinicalRecordRequest, DEFAULT_REVIEW,
};
use crate::services::{pdf, validation};

pub struct ClinicalRecordService {
    supabase: SupabaseClient,
    profiles: ProfileService,
    appointments: AppointmentBookingService,
}

impl ClinicalRecordService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            profiles: ProfileService::new(config),
            appointments: AppointmentBookingService::new(config),
        }
    }

    async fn fetch_records(&self, query: &str, auth_token: &str) -> Result<Vec<ClinicalRecord>, ClinicalRecordError> {
        let path = format!("/rest/v1/historias_clinicas?{}", query);
        let rows: Vec<Value> = self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ClinicalRecordError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(record_from_row).collect()
    }

    pub async fn get_record(&self, record_id: &str, auth_token: &str) -> Result<ClinicalRecord, ClinicalRecordError> {
        let query = format!("id=eq.{}", urlencoding::encode(record_id));
        self.fetch_records(&query, auth_token)
            .await?
            .into_iter()
            .next()
            .ok_or(ClinicalRecordError::NotFound)
    }

    /// Profiles of the given users keyed by id. A failed lookup is logged and
    /// yields an empty map.
    async fn profiles_by_id(&self, ids: HashSet<&str>, auth_token: &str) -> HashMap<String, Profile> {
        let ids: Vec<String> = ids.into_iter().map(str::to_string).collect();
        match self.profiles.profiles_by_ids(&ids, auth_token).await {
            Ok(profiles) => profiles.into_iter().map(|p| (p.user_id.clone(), p)).collect(),
            Err(e) => {
                warn!("Could not load profiles for clinical records: {}", e);
                HashMap::new()
            }
        }
    }

    async fn enrich(
        &self,
        records: Vec<ClinicalRecord>,
        with_patients: bool,
        with_specialists: bool,
        auth_token: &str,
    ) -> Vec<RecordEntry> {
        let patients = if with_patients {
            self.profiles_by_id(records.iter().map(|r| r.paciente_id.as_str()).collect(), auth_token).await
        } else {
            HashMap::new()
        };
        let specialists = if with_specialists {
            self.profiles_by_id(records.iter().map(|r| r.especialista_id.as_str()).collect(), auth_token).await
        } else {
            HashMap::new()
        };

        records
            .into_iter()
            .map(|historia| RecordEntry {
                paciente: patients.get(&historia.paciente_id).cloned(),
                especialista: specialists.get(&historia.especialista_id).cloned(),
                historia,
            })
            .collect()
    }

    // ==========================================================================
    // CREATE
    // ==========================================================================

    /// Stores the record of an accepted appointment and completes it.
    pub async fn create_record(
        &self,
        appointment_id: &str,
        viewer: &Viewer,
        request: CreateClinicalRecordRequest,
        auth_token: &str,
    ) -> Result<ClinicalRecord, ClinicalRecordError> {
        let appointment = self
            .appointments
            .get_appointment(appointment_id, auth_token)
            .await
            .map_err(|e| match e {
                appointment_cell::AppointmentError::NotFound => ClinicalRecordError::AppointmentNotFound,
                other => other.into(),
            })?;

        if !viewer.is_specialist_of(&appointment) {
            warn!("User {} tried to document appointment {}", viewer.user_id, appointment_id);
            return Err(ClinicalRecordError::Unauthorized);
        }
        if appointment.estado != AppointmentStatus::Accepted {
            return Err(ClinicalRecordError::AppointmentNotAccepted(appointment.estado));
        }

        let existing = format!("select=id,turno_id&turno_id=eq.{}", urlencoding::encode(appointment_id));
        let existing_rows: Vec<Value> = self.supabase
            .request(
                Method::GET,
                &format!("/rest/v1/historias_clinicas?{}", existing),
                Some(auth_token),
                None,
            )
            .await
            .map_err(|e| ClinicalRecordError::DatabaseError(e.to_string()))?;
        if !existing_rows.is_empty() {
            return Err(ClinicalRecordError::AlreadyExists);
        }

        let validated = validation::validate_new_record(&request)?;
        let resena = request
            .resena
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_REVIEW)
            .to_string();

        let now = Utc::now().to_rfc3339();
        let row = json!({
            "paciente_id": appointment.pacienteid,
            "especialista_id": appointment.especialistaid,
            "turno_id": appointment.id,
            "fecha_atencion": now,
            "altura": validated.altura,
            "peso": validated.peso,
            "temperatura": validated.temperatura,
            "presion": validated.presion,
            "datos_dinamicos": validated.datos_dinamicos,
            "created_at": now,
            "updated_at": now,
        });

        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase
            .request_with_headers(Method::POST, "/rest/v1/historias_clinicas", Some(auth_token), Some(row), Some(headers))
            .await
            .map_err(|e| ClinicalRecordError::DatabaseError(e.to_string()))?;

        let created = result
            .into_iter()
            .next()
            .ok_or_else(|| ClinicalRecordError::DatabaseError("Failed to create clinical record".to_string()))?;
        let record = record_from_row(created)?;
        info!("Clinical record {} created for appointment {}", record.id, appointment_id);

        if let Err(e) = self
            .appointments
            .change_status(appointment_id, viewer, StatusChange::Complete { resena }, auth_token)
            .await
        {
            warn!("Appointment {} not completed, removing record {}: {}", appointment_id, record.id, e);
            let path = format!("/rest/v1/historias_clinicas?id=eq.{}", urlencoding::encode(&record.id));
            if let Err(cleanup) = self.supabase
                .request_empty(Method::DELETE, &path, Some(auth_token), None)
                .await
            {
                warn!("Could not remove orphaned clinical record {}: {}", record.id, cleanup);
            }
            return Err(e.into());
        }

        Ok(record)
    }

    // ==========================================================================
    // READS
    // ==========================================================================

    /// Records of a patient, newest first, with the specialist who wrote each.
    /// Readable by the patient, administrators and specialists who attended them.
    pub async fn records_for_patient(
        &self,
        patient_id: &str,
        viewer: &Viewer,
        auth_token: &str,
    ) -> Result<Vec<RecordEntry>, ClinicalRecordError> {
        debug!("Fetching clinical records for patient: {}", patient_id);
        let query = format!(
            "paciente_id=eq.{}&order=fecha_atencion.desc",
            urlencoding::encode(patient_id)
        );
        let records = self.fetch_records(&query, auth_token).await?;

        let allowed = match viewer.role {
            Role::Administrator => true,
            Role::Patient => viewer.user_id == patient_id,
            Role::Specialist => records.iter().any(|r| r.especialista_id == viewer.user_id),
        };
        if !allowed {
            warn!("User {} denied access to records of {}", viewer.user_id, patient_id);
            return Err(ClinicalRecordError::Unauthorized);
        }

        Ok(self.enrich(records, false, true, auth_token).await)
    }

    pub async fn records_for_specialist(
        &self,
        specialist_id: &str,
        auth_token: &str,
    ) -> Result<Vec<RecordEntry>, ClinicalRecordError> {
        let query = format!(
            "especialista_id=eq.{}&order=fecha_atencion.desc",
            urlencoding::encode(specialist_id)
        );
        let records = self.fetch_records(&query, auth_token).await?;
        Ok(records.into_iter().map(RecordEntry::bare).collect())
    }

    pub async fn all_records(&self, auth_token: &str) -> Result<Vec<RecordEntry>, ClinicalRecordError> {
        let records = self.fetch_records("order=fecha_atencion.desc", auth_token).await?;
        Ok(self.enrich(records, true, true, auth_token).await)
    }

    /// Unique patients with at least one record by the specialist, first-seen order.
    pub async fn patients_attended(
        &self,
        specialist_id: &str,
        auth_token: &str,
    ) -> Result<AttendedPatients, ClinicalRecordError> {
        let query = format!(
            "select=paciente_id&especialista_id=eq.{}",
            urlencoding::encode(specialist_id)
        );
        let rows: Vec<Value> = self.supabase
            .request(Method::GET, &format!("/rest/v1/historias_clinicas?{}", query), Some(auth_token), None)
            .await
            .map_err(|e| ClinicalRecordError::DatabaseError(e.to_string()))?;

        let mut seen = HashSet::new();
        let paciente_ids: Vec<String> = rows
            .iter()
            .filter_map(|row| row["paciente_id"].as_str())
            .filter(|id| seen.insert(id.to_string()))
            .map(str::to_string)
            .collect();

        let found = self.profiles.profiles_by_ids(&paciente_ids, auth_token).await?;
        let mut by_id: HashMap<String, Profile> = found.into_iter().map(|p| (p.user_id.clone(), p)).collect();
        let pacientes = paciente_ids.iter().filter_map(|id| by_id.remove(id)).collect();

        Ok(AttendedPatients { paciente_ids, pacientes })
    }

    pub async fn records_for_patient_by_specialist(
        &self,
        patient_id: &str,
        specialist_id: &str,
        auth_token: &str,
    ) -> Result<Vec<RecordEntry>, ClinicalRecordError> {
        let query = format!(
            "paciente_id=eq.{}&especialista_id=eq.{}&order=fecha_atencion.desc",
            urlencoding::encode(patient_id),
            urlencoding::encode(specialist_id)
        );
        let records = self.fetch_records(&query, auth_token).await?;
        Ok(records.into_iter().map(RecordEntry::bare).collect())
    }

    // ==========================================================================
    // UPDATE / DELETE
    // ==========================================================================

    pub async fn update_record(
        &self,
        record_id: &str,
        viewer: &Viewer,
        request: UpdateClinicalRecordRequest,
        auth_token: &str,
    ) -> Result<ClinicalRecord, ClinicalRecordError> {
        let record = self.get_record(record_id, auth_token).await?;
        if viewer.role != Role::Specialist || record.especialista_id != viewer.user_id {
            return Err(ClinicalRecordError::Unauthorized);
        }
        if request.is_empty() {
            return Err(ClinicalRecordError::ValidationError("No hay cambios para guardar".to_string()));
        }

        let validated = validation::validate_update(&request)?;

        let mut patch = Map::new();
        if let Some(altura) = validated.altura {
            patch.insert("altura".to_string(), json!(altura));
        }
        if let Some(peso) = validated.peso {
            patch.insert("peso".to_string(), json!(peso));
        }
        if let Some(temperatura) = validated.temperatura {
            patch.insert("temperatura".to_string(), json!(temperatura));
        }
        if let Some(presion) = validated.presion {
            patch.insert("presion".to_string(), json!(presion));
        }
        if let Some(datos) = validated.datos_dinamicos {
            patch.insert("datos_dinamicos".to_string(), json!(datos));
        }
        patch.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/historias_clinicas?id=eq.{}", urlencoding::encode(record_id));
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase
            .request_with_headers(Method::PATCH, &path, Some(auth_token), Some(Value::Object(patch)), Some(headers))
            .await
            .map_err(|e| ClinicalRecordError::DatabaseError(e.to_string()))?;

        let updated = result.into_iter().next().ok_or(ClinicalRecordError::NotFound)?;
        info!("Clinical record {} updated by {}", record_id, viewer.user_id);
        record_from_row(updated)
    }

    pub async fn delete_record(&self, record_id: &str, auth_token: &str) -> Result<(), ClinicalRecordError> {
        self.get_record(record_id, auth_token).await?;

        let path = format!("/rest/v1/historias_clinicas?id=eq.{}", urlencoding::encode(record_id));
        self.supabase
            .request_empty(Method::DELETE, &path, Some(auth_token), None)
            .await
            .map_err(|e| ClinicalRecordError::DatabaseError(e.to_string()))?;

        info!("Clinical record {} deleted", record_id);
        Ok(())
    }

    // ==========================================================================
    // EXPORT
    // ==========================================================================

    pub async fn export_patient_pdf(
        &self,
        patient_id: &str,
        viewer: &Viewer,
        auth_token: &str,
    ) -> Result<Vec<u8>, ClinicalRecordError> {
        let entries = self.records_for_patient(patient_id, viewer, auth_token).await?;
        let patient = self
            .profiles
            .find_profile(patient_id, auth_token)
            .await?
            .ok_or(ClinicalRecordError::PatientNotFound)?;

        let bytes = pdf::render_patient_history(&patient, &entries, Local::now().date_naive())?;
        info!("Exported {} clinical records of {} as PDF", entries.len(), patient_id);
        Ok(bytes)
    }
}
