use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::models::{
    Appointment, AppointmentAction, AppointmentError, AppointmentStatus, StatusChange, Viewer,
};

const RATING_RANGE: std::ops::RangeInclusive<i32> = 1..=5;

/// Every rule about who may move an appointment where lives here.
#[derive(Debug, Default, Clone, Copy)]
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Validate that a status transition is allowed
    pub fn validate_status_transition(
        &self,
        current_status: &AppointmentStatus,
        new_status: &AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition from {} to {}", current_status, new_status);

        let valid_transitions = self.get_valid_transitions(current_status);

        if !valid_transitions.contains(new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(AppointmentError::InvalidStatusTransition(*current_status));
        }

        Ok(())
    }

    /// Get all valid next statuses for a given current status
    pub fn get_valid_transitions(&self, current_status: &AppointmentStatus) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Pending => vec![
                AppointmentStatus::Accepted,
                AppointmentStatus::Rejected,
                AppointmentStatus::Cancelled,
            ],
            AppointmentStatus::Accepted => vec![
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
            ],
            // Terminal states
            AppointmentStatus::Completed => vec![],
            AppointmentStatus::Cancelled => vec![],
            AppointmentStatus::Rejected => vec![],
        }
    }

    /// Whether the viewer holds the role an action needs on this appointment,
    /// regardless of its current state.
    fn actor_allowed(&self, appointment: &Appointment, viewer: &Viewer, action: AppointmentAction) -> bool {
        match action {
            AppointmentAction::Accept | AppointmentAction::Reject | AppointmentAction::Complete => {
                viewer.is_specialist_of(appointment)
            }
            AppointmentAction::Cancel | AppointmentAction::ViewReview => viewer.can_view(appointment),
            AppointmentAction::Rate | AppointmentAction::Survey => viewer.is_patient_of(appointment),
        }
    }

    pub fn can_perform(&self, appointment: &Appointment, viewer: &Viewer, action: AppointmentAction) -> bool {
        if !self.actor_allowed(appointment, viewer, action) {
            return false;
        }

        let status = appointment.estado;
        match action {
            AppointmentAction::Accept | AppointmentAction::Reject => status == AppointmentStatus::Pending,
            AppointmentAction::Cancel => {
                matches!(status, AppointmentStatus::Pending | AppointmentStatus::Accepted)
            }
            AppointmentAction::Complete => status == AppointmentStatus::Accepted,
            AppointmentAction::Rate => status == AppointmentStatus::Completed && !appointment.is_rated(),
            AppointmentAction::Survey => {
                status == AppointmentStatus::Completed
                    && appointment.has_review()
                    && !appointment.survey_completed()
            }
            AppointmentAction::ViewReview => appointment.has_review(),
        }
    }

    pub fn available_actions(&self, appointment: &Appointment, viewer: &Viewer) -> Vec<AppointmentAction> {
        [
            AppointmentAction::Accept,
            AppointmentAction::Reject,
            AppointmentAction::Cancel,
            AppointmentAction::Complete,
            AppointmentAction::Rate,
            AppointmentAction::Survey,
            AppointmentAction::ViewReview,
        ]
        .into_iter()
        .filter(|action| self.can_perform(appointment, viewer, *action))
        .collect()
    }

    /// Checks a status change and builds the PATCH body that applies it.
    pub fn plan_status_change(
        &self,
        appointment: &Appointment,
        viewer: &Viewer,
        change: &StatusChange,
    ) -> Result<Value, AppointmentError> {
        if !self.actor_allowed(appointment, viewer, change.action()) {
            warn!(
                "User {} may not {:?} appointment {}",
                viewer.user_id,
                change.action(),
                appointment.id
            );
            return Err(AppointmentError::Unauthorized);
        }

        let target = change.target();
        self.validate_status_transition(&appointment.estado, &target)?;

        let body = match change {
            StatusChange::Accept => json!({ "estado": target }),
            StatusChange::Reject { comentario } => json!({
                "estado": target,
                "comentarioespecialista": required_text(comentario, "El comentario es obligatorio")?,
            }),
            StatusChange::Cancel { comentario } => {
                let comentario = required_text(comentario, "El comentario es obligatorio")?;
                if viewer.is_patient_of(appointment) {
                    json!({ "estado": target, "comentariopaciente": comentario })
                } else {
                    json!({ "estado": target, "comentarioespecialista": comentario })
                }
            }
            StatusChange::Complete { resena } => json!({
                "estado": target,
                "resena": required_text(resena, "La reseña es obligatoria")?,
            }),
        };

        info!(
            "Appointment {} transition planned: {} -> {}",
            appointment.id, appointment.estado, target
        );
        Ok(body)
    }

    pub fn plan_rating(
        &self,
        appointment: &Appointment,
        viewer: &Viewer,
        puntaje: i32,
        comentario: &str,
    ) -> Result<Value, AppointmentError> {
        if !viewer.is_patient_of(appointment) {
            return Err(AppointmentError::Unauthorized);
        }
        if appointment.estado != AppointmentStatus::Completed {
            return Err(AppointmentError::InvalidStatusTransition(appointment.estado));
        }
        if appointment.is_rated() {
            return Err(AppointmentError::AlreadyRated);
        }
        if !RATING_RANGE.contains(&puntaje) {
            return Err(AppointmentError::ValidationError(
                "El puntaje debe estar entre 1 y 5".to_string(),
            ));
        }

        let comentario = required_text(comentario, "El comentario es obligatorio")?;
        Ok(json!({
            "calificacionatencion": { "puntaje": puntaje, "comentario": comentario }
        }))
    }

    pub fn plan_survey(
        &self,
        appointment: &Appointment,
        viewer: &Viewer,
        comentario: &str,
        estrellas: i32,
    ) -> Result<Value, AppointmentError> {
        if !viewer.is_patient_of(appointment) {
            return Err(AppointmentError::Unauthorized);
        }
        if !self.can_perform(appointment, viewer, AppointmentAction::Survey) {
            return Err(AppointmentError::SurveyNotAvailable);
        }
        if !RATING_RANGE.contains(&estrellas) {
            return Err(AppointmentError::ValidationError(
                "Las estrellas deben estar entre 1 y 5".to_string(),
            ));
        }

        let comentario = required_text(comentario, "El comentario es obligatorio")?;
        Ok(json!({
            "encuestacompletada": true,
            "encuestacomentario": comentario,
            "encuestaestrellas": estrellas,
        }))
    }
}

fn required_text(value: &str, message: &str) -> Result<String, AppointmentError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppointmentError::ValidationError(message.to_string()));
    }
    Ok(trimmed.to_string())
}
