use chrono::{Local, NaiveDate, NaiveTime, Weekday};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use profile_cell::{Profile, ProfileService};
use shared_config::{AppConfig, ClinicHours};
use shared_database::supabase::SupabaseClient;
use shared_utils::format::{parse_clock_time, parse_local_datetime, parse_spanish_weekday, spanish_weekday};

use crate::models::{
    Availability, AvailableDay, CreateAvailabilityRequest, SpecialistError, TimeSlot, TimeWindow,
};
use crate::services::slots::{self, OCCUPYING_STATES};

/// Checks a new availability window against clinic hours, the specialist's
/// specialties and the specialist's existing windows.
pub fn validate_new_window(
    request: &CreateAvailabilityRequest,
    hours: &ClinicHours,
    specialist: &Profile,
    existing: &[Availability],
) -> Result<(Weekday, TimeWindow, String), SpecialistError> {
    let weekday = parse_spanish_weekday(&request.dia)
        .filter(|d| *d != Weekday::Sun)
        .ok_or_else(|| SpecialistError::InvalidDay(request.dia.clone()))?;

    let start = parse_clock_time(&request.hora_inicio)
        .ok_or_else(|| SpecialistError::ValidationError(format!("Hora inválida: {}", request.hora_inicio)))?;
    let end = parse_clock_time(&request.hora_fin)
        .ok_or_else(|| SpecialistError::ValidationError(format!("Hora inválida: {}", request.hora_fin)))?;

    if start >= end {
        return Err(SpecialistError::InvalidTimeRange);
    }

    if !hours.contains(weekday, start, end) {
        let range = hours
            .for_weekday(weekday)
            .map(|(open, close)| format!("{} {} a {}", spanish_weekday(weekday), open.format("%H:%M"), close.format("%H:%M")))
            .unwrap_or_else(|| "cerrado".to_string());
        return Err(SpecialistError::OutsideClinicHours(range));
    }

    let specialty = specialist
        .find_specialty(&request.especialidad)
        .ok_or_else(|| SpecialistError::SpecialtyNotOffered(request.especialidad.trim().to_string()))?;

    let window = TimeWindow { start, end };
    let overlaps = existing
        .iter()
        .filter(|a| a.especialista_id == specialist.user_id)
        .filter(|a| a.weekday() == Some(weekday))
        .filter_map(Availability::window)
        .any(|w| w.overlaps(&window));

    if overlaps {
        return Err(SpecialistError::Overlap(spanish_weekday(weekday).to_string()));
    }

    Ok((weekday, window, specialty))
}

pub struct AvailabilityService {
    supabase: SupabaseClient,
    profiles: ProfileService,
    clinic_hours: ClinicHours,
    horizon_days: u32,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            profiles: ProfileService::new(config),
            clinic_hours: config.clinic_hours,
            horizon_days: config.booking_horizon_days,
        }
    }

    pub async fn list_for_specialist(
        &self,
        specialist_id: &str,
        auth_token: &str,
    ) -> Result<Vec<Availability>, SpecialistError> {
        debug!("Fetching availability for specialist: {}", specialist_id);

        let path = format!(
            "/rest/v1/disponibilidad?especialista_id=eq.{}",
            urlencoding::encode(specialist_id)
        );
        let rows: Vec<Value> = self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SpecialistError::DatabaseError(e.to_string()))?;

        let availability = rows
            .into_iter()
            .filter_map(|row| match serde_json::from_value::<Availability>(row) {
                Ok(a) => Some(a),
                Err(e) => {
                    warn!("Skipping malformed availability row: {}", e);
                    None
                }
            })
            .collect();

        Ok(availability)
    }

    async fn specialist_profile(&self, specialist_id: &str, auth_token: &str) -> Result<Profile, SpecialistError> {
        let profile = self.profiles
            .find_profile(specialist_id, auth_token)
            .await?
            .ok_or(SpecialistError::NotFound)?;

        if !profile.is_specialist() {
            return Err(SpecialistError::NotFound);
        }
        Ok(profile)
    }

    pub async fn add_availability(
        &self,
        specialist_id: &str,
        request: CreateAvailabilityRequest,
        auth_token: &str,
    ) -> Result<Availability, SpecialistError> {
        let specialist = self.specialist_profile(specialist_id, auth_token).await?;
        let existing = self.list_for_specialist(specialist_id, auth_token).await?;

        let (weekday, window, specialty) =
            validate_new_window(&request, &self.clinic_hours, &specialist, &existing).map_err(|e| {
                warn!("Rejected availability for {}: {}", specialist_id, e);
                e
            })?;

        let row = json!({
            "especialista_id": specialist_id,
            "especialidad": specialty,
            "dia": spanish_weekday(weekday),
            "hora_inicio": window.start.format("%H:%M").to_string(),
            "hora_fin": window.end.format("%H:%M").to_string(),
        });

        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase
            .request_with_headers(Method::POST, "/rest/v1/disponibilidad", Some(auth_token), Some(row), Some(headers))
            .await
            .map_err(|e| SpecialistError::DatabaseError(e.to_string()))?;

        let created = result
            .into_iter()
            .next()
            .ok_or_else(|| SpecialistError::DatabaseError("Failed to create availability".to_string()))?;

        info!("Availability added for specialist {} on {}", specialist_id, spanish_weekday(weekday));
        serde_json::from_value(created).map_err(|e| SpecialistError::DatabaseError(e.to_string()))
    }

    pub async fn delete_availability(
        &self,
        specialist_id: &str,
        availability_id: &str,
        auth_token: &str,
    ) -> Result<(), SpecialistError> {
        let path = format!(
            "/rest/v1/disponibilidad?id=eq.{}&especialista_id=eq.{}",
            urlencoding::encode(availability_id),
            urlencoding::encode(specialist_id)
        );

        let existing: Vec<Value> = self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SpecialistError::DatabaseError(e.to_string()))?;

        if existing.is_empty() {
            return Err(SpecialistError::AvailabilityNotFound);
        }

        self.supabase
            .request_empty(Method::DELETE, &path, Some(auth_token), None)
            .await
            .map_err(|e| SpecialistError::DatabaseError(e.to_string()))?;

        info!("Availability {} removed for specialist {}", availability_id, specialist_id);
        Ok(())
    }

    /// Start times of the specialist's appointments on `date` that still hold their slot.
    pub async fn booked_starts(
        &self,
        specialist_id: &str,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<NaiveTime>, SpecialistError> {
        let path = format!(
            "/rest/v1/turnos?select=fecha,estado&especialistaid=eq.{}&fecha=gte.{}T00:00:00&fecha=lte.{}T23:59:59&estado=in.({})",
            urlencoding::encode(specialist_id),
            date,
            date,
            OCCUPYING_STATES.join(",")
        );

        let rows: Vec<Value> = self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SpecialistError::DatabaseError(e.to_string()))?;

        Ok(rows
            .iter()
            .filter(|row| {
                row["estado"]
                    .as_str()
                    .map(|estado| OCCUPYING_STATES.contains(&estado))
                    .unwrap_or(true)
            })
            .filter_map(|row| row["fecha"].as_str().and_then(parse_local_datetime))
            .filter(|fecha| fecha.date() == date)
            .map(|fecha| fecha.time())
            .collect())
    }

    pub async fn available_days(
        &self,
        specialist_id: &str,
        specialty: &str,
        auth_token: &str,
    ) -> Result<Vec<AvailableDay>, SpecialistError> {
        let availability = self.list_for_specialist(specialist_id, auth_token).await?;
        let today = Local::now().date_naive();

        Ok(slots::upcoming_days(&availability, specialty, today, self.horizon_days))
    }

    pub async fn available_slots(
        &self,
        specialist_id: &str,
        specialty: &str,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<TimeSlot>, SpecialistError> {
        let now = Local::now().naive_local();
        if !slots::within_horizon(date, now.date(), self.horizon_days) {
            debug!("Date {} outside booking horizon", date);
            return Ok(Vec::new());
        }

        let availability = self.list_for_specialist(specialist_id, auth_token).await?;
        let booked = self.booked_starts(specialist_id, date, auth_token).await?;

        Ok(slots::slots_for_date(&availability, specialty, date, &booked, now, self.horizon_days))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn specialist() -> Profile {
        serde_json::from_value(json!({
            "user_id": "spec-1",
            "nombre": "Luis",
            "apellido": "Pérez",
            "email": "luis@clinica.com",
            "tipo": "especialista",
            "especialidad": "Cardiologia, clinica",
            "aprobado": true
        }))
        .unwrap()
    }

    fn request(dia: &str, especialidad: &str, start: &str, end: &str) -> CreateAvailabilityRequest {
        CreateAvailabilityRequest {
            especialidad: especialidad.to_string(),
            dia: dia.to_string(),
            hora_inicio: start.to_string(),
            hora_fin: end.to_string(),
        }
    }

    fn existing(dia: &str, start: &str, end: &str) -> Availability {
        Availability {
            id: None,
            especialista_id: "spec-1".to_string(),
            especialidad: "clinica".to_string(),
            dia: dia.to_string(),
            hora_inicio: start.to_string(),
            hora_fin: end.to_string(),
        }
    }

    #[test]
    fn accepts_window_inside_clinic_hours() {
        let hours = ClinicHours::default();
        let (day, window, specialty) =
            validate_new_window(&request("lunes", "cardiologia", "08:00", "12:00"), &hours, &specialist(), &[])
                .unwrap();
        assert_eq!(day, Weekday::Mon);
        assert_eq!(window.end, NaiveTime::from_hms_opt(12, 0, 0).unwrap());
        assert_eq!(specialty, "Cardiologia");
    }

    #[test]
    fn rejects_sunday_and_inverted_ranges() {
        let hours = ClinicHours::default();
        assert_matches!(
            validate_new_window(&request("Domingo", "clinica", "09:00", "10:00"), &hours, &specialist(), &[]),
            Err(SpecialistError::InvalidDay(_))
        );
        assert_matches!(
            validate_new_window(&request("Martes", "clinica", "10:00", "10:00"), &hours, &specialist(), &[]),
            Err(SpecialistError::InvalidTimeRange)
        );
    }

    #[test]
    fn saturday_closes_early() {
        let hours = ClinicHours::default();
        assert_matches!(
            validate_new_window(&request("Sábado", "clinica", "12:00", "15:00"), &hours, &specialist(), &[]),
            Err(SpecialistError::OutsideClinicHours(ref msg)) if msg.contains("14:00")
        );
        assert!(validate_new_window(&request("Sábado", "clinica", "08:00", "14:00"), &hours, &specialist(), &[]).is_ok());
    }

    #[test]
    fn rejects_unknown_specialty_and_overlaps() {
        let hours = ClinicHours::default();
        assert_matches!(
            validate_new_window(&request("Lunes", "pediatria", "08:00", "09:00"), &hours, &specialist(), &[]),
            Err(SpecialistError::SpecialtyNotOffered(_))
        );

        let current = vec![existing("Lunes", "09:00", "11:00")];
        assert_matches!(
            validate_new_window(&request("Lunes", "cardiologia", "10:30", "12:00"), &hours, &specialist(), &current),
            Err(SpecialistError::Overlap(_))
        );
        assert!(validate_new_window(&request("Lunes", "cardiologia", "11:00", "12:00"), &hours, &specialist(), &current).is_ok());
        assert!(validate_new_window(&request("Martes", "cardiologia", "09:00", "11:00"), &hours, &specialist(), &current).is_ok());
    }
}
