use chrono::NaiveDateTime;

use shared_models::role::Role;
use shared_utils::format::{format_date_long, format_date_short, format_time_12h, same_specialty, status_label};

use crate::models::{Appointment, AppointmentStatus, AppointmentWithRecord, SearchQuery, SpecialistDashboard};

const UPCOMING_LIMIT: usize = 5;

/// Applies the exact filters and the free-text query of `query`.
pub fn search(
    appointments: Vec<AppointmentWithRecord>,
    query: &SearchQuery,
    view: Role,
) -> Vec<AppointmentWithRecord> {
    let text = query
        .q
        .as_deref()
        .map(|q| q.trim().to_lowercase())
        .filter(|q| !q.is_empty());

    appointments
        .into_iter()
        .filter(|item| matches_filters(&item.appointment, query))
        .filter(|item| text.as_deref().map(|t| matches_text(item, t, view)).unwrap_or(true))
        .collect()
}

pub fn matches_filters(appointment: &Appointment, query: &SearchQuery) -> bool {
    if let Some(especialidad) = query.especialidad.as_deref().filter(|s| !s.trim().is_empty()) {
        let matches = appointment
            .especialidad
            .as_deref()
            .map(|s| same_specialty(s, especialidad))
            .unwrap_or(false);
        if !matches {
            return false;
        }
    }
    if let Some(id) = query.especialista_id.as_deref() {
        if appointment.especialistaid != id {
            return false;
        }
    }
    if let Some(id) = query.paciente_id.as_deref() {
        if appointment.pacienteid != id {
            return false;
        }
    }
    if let Some(estado) = query.estado {
        if appointment.estado != estado {
            return false;
        }
    }
    true
}

/// Case-insensitive substring match over everything a viewer can read about
/// the appointment. `text` is expected lowercased.
pub fn matches_text(item: &AppointmentWithRecord, text: &str, view: Role) -> bool {
    searchable_terms(item, view)
        .iter()
        .any(|term| term.to_lowercase().contains(text))
}

fn searchable_terms(item: &AppointmentWithRecord, view: Role) -> Vec<String> {
    let appointment = &item.appointment;
    let mut terms = Vec::new();

    terms.extend(appointment.especialidad.clone());
    match view {
        Role::Patient => terms.extend(appointment.especialistanombre.clone()),
        Role::Specialist => terms.extend(appointment.pacientenombre.clone()),
        Role::Administrator => {
            terms.extend(appointment.especialistanombre.clone());
            terms.extend(appointment.pacientenombre.clone());
        }
    }

    terms.push(appointment.estado.as_str().to_string());
    terms.push(status_label(appointment.estado.as_str()));

    terms.push(appointment.fecha.clone());
    if let Some(at) = appointment.scheduled_at() {
        terms.extend(date_terms(at));
    }

    terms.extend(appointment.comentariopaciente.clone());
    terms.extend(appointment.comentarioespecialista.clone());
    terms.extend(appointment.resena.clone());
    if let Some(rating) = &appointment.calificacionatencion {
        terms.push(rating.comentario.clone());
    }

    if let Some(record) = &item.historia_clinica {
        terms.extend(record.altura.map(|v| v.to_string()));
        terms.extend(record.peso.map(|v| v.to_string()));
        terms.extend(record.temperatura.map(|v| v.to_string()));
        terms.extend(record.presion.clone());
        for field in record.fields() {
            terms.push(field.clave.clone());
            terms.push(field.valor.clone());
        }
    }

    terms
}

fn date_terms(at: NaiveDateTime) -> Vec<String> {
    vec![
        format_date_short(at.date()),
        format_date_long(at.date()),
        format_time_12h(at.time()),
    ]
}

/// Counts and upcoming agenda for a specialist's own appointments.
pub fn specialist_dashboard(appointments: &[Appointment], now: NaiveDateTime) -> SpecialistDashboard {
    let count = |status: AppointmentStatus| appointments.iter().filter(|a| a.estado == status).count();

    let mut patients: Vec<&str> = appointments.iter().map(|a| a.pacienteid.as_str()).collect();
    patients.sort_unstable();
    patients.dedup();

    let mut upcoming: Vec<(NaiveDateTime, &Appointment)> = appointments
        .iter()
        .filter(|a| matches!(a.estado, AppointmentStatus::Pending | AppointmentStatus::Accepted))
        .filter_map(|a| a.scheduled_at().map(|at| (at, a)))
        .filter(|(at, _)| *at >= now)
        .collect();
    upcoming.sort_by_key(|(at, _)| *at);

    SpecialistDashboard {
        pendientes: count(AppointmentStatus::Pending),
        aceptados: count(AppointmentStatus::Accepted),
        realizados: count(AppointmentStatus::Completed),
        pacientes: patients.len(),
        proximos: upcoming
            .into_iter()
            .take(UPCOMING_LIMIT)
            .map(|(_, a)| a.clone())
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn item(id: &str, estado: &str, fecha: &str, record: Option<serde_json::Value>) -> AppointmentWithRecord {
        serde_json::from_value(json!({
            "id": id,
            "pacienteid": "p1",
            "pacientenombre": "Ana García",
            "especialistaid": "s1",
            "especialistanombre": "Luis Pérez",
            "especialidad": "Cardiologia",
            "fecha": fecha,
            "estado": estado,
            "comentariopaciente": "Dolor de pecho",
            "historia_clinica": record
        }))
        .unwrap()
    }

    fn query(q: &str) -> SearchQuery {
        SearchQuery { q: Some(q.to_string()), ..Default::default() }
    }

    #[test]
    fn counterpart_name_depends_on_view() {
        let list = vec![item("t1", "pendiente", "2024-01-15T09:30:00", None)];

        assert_eq!(search(list.clone(), &query("luis"), Role::Patient).len(), 1);
        assert!(search(list.clone(), &query("luis"), Role::Specialist).is_empty());
        assert_eq!(search(list.clone(), &query("ANA"), Role::Specialist).len(), 1);
        assert_eq!(search(list, &query("ana"), Role::Administrator).len(), 1);
    }

    #[test]
    fn matches_status_label_date_and_comments() {
        let list = vec![item("t1", "realizado", "2024-01-15T09:30:00", None)];

        assert_eq!(search(list.clone(), &query("Realizado"), Role::Patient).len(), 1);
        assert_eq!(search(list.clone(), &query("15/1/2024"), Role::Patient).len(), 1);
        assert_eq!(search(list.clone(), &query("enero"), Role::Patient).len(), 1);
        assert_eq!(search(list, &query("pecho"), Role::Patient).len(), 1);
    }

    #[test]
    fn matches_clinical_record_fields() {
        let record = json!({
            "turno_id": "t1",
            "altura": 1.7,
            "peso": 70.0,
            "temperatura": 36.6,
            "presion": "120/80",
            "datos_dinamicos": [{ "clave": "caries", "valor": "4" }]
        });
        let list = vec![
            item("t1", "realizado", "2024-01-15T09:30:00", Some(record)),
            item("t2", "pendiente", "2024-01-16T10:00:00", None),
        ];

        let found = search(list.clone(), &query("caries"), Role::Specialist);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].appointment.id, "t1");
        assert_eq!(search(list.clone(), &query("120/80"), Role::Specialist).len(), 1);
        assert_eq!(search(list, &query("36.6"), Role::Specialist).len(), 1);
    }

    #[test]
    fn exact_filters_combine_with_text() {
        let list = vec![
            item("t1", "realizado", "2024-01-15T09:30:00", None),
            item("t2", "pendiente", "2024-01-16T10:00:00", None),
        ];
        let filtered = search(
            list,
            &SearchQuery {
                q: Some("cardio".to_string()),
                estado: Some(AppointmentStatus::Pending),
                especialidad: Some("cardiologia".to_string()),
                ..Default::default()
            },
            Role::Administrator,
        );

        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].appointment.id, "t2");
    }

    #[test]
    fn blank_query_returns_everything() {
        let list = vec![
            item("t1", "realizado", "2024-01-15T09:30:00", None),
            item("t2", "pendiente", "2024-01-16T10:00:00", None),
        ];
        assert_eq!(search(list, &query("   "), Role::Patient).len(), 2);
    }

    #[test]
    fn dashboard_counts_and_orders_upcoming() {
        let now = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap().and_hms_opt(12, 0, 0).unwrap();
        let mut appointments: Vec<Appointment> = vec![
            item("t1", "pendiente", "2024-01-20T09:00:00", None),
            item("t2", "aceptado", "2024-01-12T09:00:00", None),
            item("t3", "realizado", "2024-01-05T09:00:00", None),
            item("t4", "aceptado", "2024-01-09T09:00:00", None),
        ]
        .into_iter()
        .map(|i| i.appointment)
        .collect();
        appointments[2].pacienteid = "p2".to_string();

        let dashboard = specialist_dashboard(&appointments, now);

        assert_eq!(dashboard.pendientes, 1);
        assert_eq!(dashboard.aceptados, 2);
        assert_eq!(dashboard.realizados, 1);
        assert_eq!(dashboard.pacientes, 2);
        let ids: Vec<&str> = dashboard.proximos.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["t2", "t1"]);
    }
}
