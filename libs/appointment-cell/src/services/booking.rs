use std::collections::HashMap;

use chrono::Local;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use profile_cell::{specialist_status, ProfileService, SpecialistStatus};
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::role::Role;
use shared_utils::format::parse_clock_time;
use specialist_cell::AvailabilityService;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, AppointmentWithRecord, LinkedRecord,
    RateRequest, RequestAppointment, SpecialistDashboard, StatusChange, SurveyRequest, Viewer,
};
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::search;

const RECORD_COLUMNS: &str = "id,turno_id,altura,peso,temperatura,presion,datos_dinamicos";

/// PostgREST filter matching rows still in `status`. Accepted rows may carry
/// the legacy `confirmado` value.
fn status_guard(status: AppointmentStatus) -> String {
    match status {
        AppointmentStatus::Accepted => "estado=in.(aceptado,confirmado)".to_string(),
        other => format!("estado=eq.{}", other),
    }
}

pub struct AppointmentBookingService {
    supabase: SupabaseClient,
    profiles: ProfileService,
    availability: AvailabilityService,
    lifecycle: AppointmentLifecycleService,
}

impl AppointmentBookingService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            profiles: ProfileService::new(config),
            availability: AvailabilityService::new(config),
            lifecycle: AppointmentLifecycleService::new(),
        }
    }

    pub fn lifecycle(&self) -> &AppointmentLifecycleService {
        &self.lifecycle
    }

    // ==========================================================================
    // BOOKING
    // ==========================================================================

    pub async fn request_appointment(
        &self,
        viewer: &Viewer,
        request: RequestAppointment,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let patient_id = match viewer.role {
            Role::Specialist => {
                return Err(AppointmentError::Forbidden(
                    "Los especialistas no pueden solicitar turnos".to_string(),
                ));
            }
            Role::Patient => match request.paciente_id.as_deref() {
                Some(id) if id != viewer.user_id => return Err(AppointmentError::Unauthorized),
                _ => viewer.user_id.clone(),
            },
            Role::Administrator => request
                .paciente_id
                .clone()
                .filter(|id| !id.trim().is_empty())
                .ok_or_else(|| {
                    AppointmentError::ValidationError("Debe seleccionar un paciente".to_string())
                })?,
        };

        let hora = parse_clock_time(&request.hora)
            .ok_or_else(|| AppointmentError::ValidationError(format!("Hora inválida: {}", request.hora)))?;

        debug!(
            "Booking request: patient {} with specialist {} on {} {}",
            patient_id, request.especialista_id, request.fecha, hora
        );

        let patient = self
            .profiles
            .find_profile(&patient_id, auth_token)
            .await?
            .filter(|p| p.tipo == Role::Patient)
            .ok_or(AppointmentError::PatientNotFound)?;

        let specialist = self
            .profiles
            .find_profile(&request.especialista_id, auth_token)
            .await?
            .filter(|p| p.is_specialist())
            .ok_or(AppointmentError::SpecialistNotFound)?;

        if specialist_status(&specialist) != SpecialistStatus::Approved {
            warn!("Booking attempted with unapproved specialist {}", specialist.user_id);
            return Err(AppointmentError::ValidationError(
                "El especialista no está habilitado para recibir turnos".to_string(),
            ));
        }

        let requested = request.especialidad.trim();
        let especialidad = specialist
            .find_specialty(requested)
            .ok_or_else(|| AppointmentError::SpecialtyNotOffered(requested.to_string()))?;

        let free = self
            .availability
            .available_slots(&specialist.user_id, &especialidad, request.fecha, auth_token)
            .await?;
        if !free.iter().any(|slot| slot.start == hora) {
            warn!(
                "Slot {} {} not free for specialist {}",
                request.fecha, hora, specialist.user_id
            );
            return Err(AppointmentError::SlotNotAvailable);
        }

        let fecha = request.fecha.and_time(hora).format("%Y-%m-%dT%H:%M:%S").to_string();
        let row = json!({
            "pacienteid": patient.user_id,
            "pacientenombre": patient.full_name(),
            "especialistaid": specialist.user_id,
            "especialistanombre": specialist.full_name(),
            "especialidad": especialidad,
            "fecha": fecha,
            "estado": AppointmentStatus::Pending,
            "encuestacompletada": false,
        });

        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase
            .request_with_headers(Method::POST, "/rest/v1/turnos", Some(auth_token), Some(row), Some(headers))
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let created = result
            .into_iter()
            .next()
            .ok_or_else(|| AppointmentError::DatabaseError("Failed to create appointment".to_string()))?;
        let appointment: Appointment =
            serde_json::from_value(created).map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        info!(
            "Appointment {} requested for {} with {} at {}",
            appointment.id, appointment.pacienteid, appointment.especialistaid, appointment.fecha
        );
        Ok(appointment)
    }

    // ==========================================================================
    // READS
    // ==========================================================================

    async fn fetch_appointments(&self, query: &str, auth_token: &str) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!("/rest/v1/turnos?{}", query);
        let rows: Vec<Value> = self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        Ok(rows
            .into_iter()
            .filter_map(|row| match serde_json::from_value::<Appointment>(row) {
                Ok(a) => Some(a),
                Err(e) => {
                    warn!("Skipping malformed appointment row: {}", e);
                    None
                }
            })
            .collect())
    }

    pub async fn get_appointment(&self, appointment_id: &str, auth_token: &str) -> Result<Appointment, AppointmentError> {
        debug!("Fetching appointment: {}", appointment_id);
        let query = format!("id=eq.{}", urlencoding::encode(appointment_id));
        self.fetch_appointments(&query, auth_token)
            .await?
            .into_iter()
            .next()
            .ok_or(AppointmentError::NotFound)
    }

    /// Loads an appointment the viewer takes part in, or any appointment for
    /// administrators.
    pub async fn get_for_viewer(
        &self,
        appointment_id: &str,
        viewer: &Viewer,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;
        if !viewer.can_view(&appointment) {
            warn!("User {} denied access to appointment {}", viewer.user_id, appointment_id);
            return Err(AppointmentError::Unauthorized);
        }
        Ok(appointment)
    }

    /// Clinical records keyed by appointment id. A failed lookup yields an
    /// empty map.
    async fn records_by_appointment(&self, appointments: &[Appointment], auth_token: &str) -> HashMap<String, LinkedRecord> {
        if appointments.is_empty() {
            return HashMap::new();
        }

        let ids = appointments.iter().map(|a| a.id.as_str()).collect::<Vec<_>>().join(",");
        let path = format!(
            "/rest/v1/historias_clinicas?select={}&turno_id=in.({})",
            RECORD_COLUMNS,
            urlencoding::encode(&ids)
        );

        let rows: Vec<Value> = match self.supabase.request(Method::GET, &path, Some(auth_token), None).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Could not load clinical records for appointments: {}", e);
                return HashMap::new();
            }
        };

        rows.into_iter()
            .filter_map(|row| serde_json::from_value::<LinkedRecord>(row).ok())
            .map(|record| (record.turno_id.clone(), record))
            .collect()
    }

    async fn with_records(&self, appointments: Vec<Appointment>, auth_token: &str) -> Vec<AppointmentWithRecord> {
        let mut records = self.records_by_appointment(&appointments, auth_token).await;
        appointments
            .into_iter()
            .map(|appointment| AppointmentWithRecord {
                historia_clinica: records.remove(&appointment.id),
                appointment,
            })
            .collect()
    }

    pub async fn list_for_patient(
        &self,
        patient_id: &str,
        auth_token: &str,
    ) -> Result<Vec<AppointmentWithRecord>, AppointmentError> {
        let query = format!("pacienteid=eq.{}&order=fecha.desc", urlencoding::encode(patient_id));
        let appointments = self.fetch_appointments(&query, auth_token).await?;
        Ok(self.with_records(appointments, auth_token).await)
    }

    pub async fn list_for_specialist(
        &self,
        specialist_id: &str,
        auth_token: &str,
    ) -> Result<Vec<AppointmentWithRecord>, AppointmentError> {
        let query = format!("especialistaid=eq.{}&order=fecha.desc", urlencoding::encode(specialist_id));
        let appointments = self.fetch_appointments(&query, auth_token).await?;
        Ok(self.with_records(appointments, auth_token).await)
    }

    pub async fn list_all(&self, auth_token: &str) -> Result<Vec<AppointmentWithRecord>, AppointmentError> {
        let appointments = self.fetch_appointments("order=fecha.desc", auth_token).await?;
        Ok(self.with_records(appointments, auth_token).await)
    }

    /// The viewer's own appointments; everything for administrators.
    pub async fn list_for_viewer(
        &self,
        viewer: &Viewer,
        auth_token: &str,
    ) -> Result<Vec<AppointmentWithRecord>, AppointmentError> {
        match viewer.role {
            Role::Patient => self.list_for_patient(&viewer.user_id, auth_token).await,
            Role::Specialist => self.list_for_specialist(&viewer.user_id, auth_token).await,
            Role::Administrator => self.list_all(auth_token).await,
        }
    }

    pub async fn specialist_dashboard(
        &self,
        specialist_id: &str,
        auth_token: &str,
    ) -> Result<SpecialistDashboard, AppointmentError> {
        let query = format!("especialistaid=eq.{}", urlencoding::encode(specialist_id));
        let appointments = self.fetch_appointments(&query, auth_token).await?;
        Ok(search::specialist_dashboard(&appointments, Local::now().naive_local()))
    }

    // ==========================================================================
    // ACTIONS
    // ==========================================================================

    /// Applies `patch` only while the row still matches `guard`. An empty
    /// result means another write got there first and maps to `conflict`.
    async fn patch_appointment(
        &self,
        appointment_id: &str,
        guard: &str,
        patch: Value,
        conflict: AppointmentError,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/turnos?id=eq.{}&{}", urlencoding::encode(appointment_id), guard);
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase
            .request_with_headers(Method::PATCH, &path, Some(auth_token), Some(patch), Some(headers))
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let updated = match result.into_iter().next() {
            Some(row) => row,
            None => {
                warn!("Appointment {} changed before the update was applied", appointment_id);
                return Err(conflict);
            }
        };
        serde_json::from_value(updated).map_err(|e| AppointmentError::DatabaseError(e.to_string()))
    }

    pub async fn change_status(
        &self,
        appointment_id: &str,
        viewer: &Viewer,
        change: StatusChange,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;
        let patch = self.lifecycle.plan_status_change(&appointment, viewer, &change)?;

        let updated = self
            .patch_appointment(
                appointment_id,
                &status_guard(appointment.estado),
                patch,
                AppointmentError::InvalidStatusTransition(appointment.estado),
                auth_token,
            )
            .await?;
        info!(
            "Appointment {} moved {} -> {} by {}",
            appointment_id, appointment.estado, updated.estado, viewer.user_id
        );
        Ok(updated)
    }

    pub async fn rate(
        &self,
        appointment_id: &str,
        viewer: &Viewer,
        request: RateRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;
        let patch = self
            .lifecycle
            .plan_rating(&appointment, viewer, request.puntaje, &request.comentario)?;

        let guard = format!("{}&calificacionatencion=is.null", status_guard(appointment.estado));
        let updated = self
            .patch_appointment(appointment_id, &guard, patch, AppointmentError::AlreadyRated, auth_token)
            .await?;
        info!("Appointment {} rated {} by patient {}", appointment_id, request.puntaje, viewer.user_id);
        Ok(updated)
    }

    pub async fn complete_survey(
        &self,
        appointment_id: &str,
        viewer: &Viewer,
        request: SurveyRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;
        let patch = self
            .lifecycle
            .plan_survey(&appointment, viewer, &request.comentario, request.estrellas)?;

        let guard = format!("{}&encuestacompletada=not.is.true", status_guard(appointment.estado));
        let updated = self
            .patch_appointment(appointment_id, &guard, patch, AppointmentError::SurveyNotAvailable, auth_token)
            .await?;
        info!("Survey completed for appointment {}", appointment_id);
        Ok(updated)
    }
}
