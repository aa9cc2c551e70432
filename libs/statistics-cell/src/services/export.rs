//! CSV renditions of the access log, the appointment list and the statistics
//! report.

use csv::{Writer, WriterBuilder};

use appointment_cell::Appointment;
use shared_utils::format::{parse_local_datetime, status_label};

use crate::models::{AccessLog, AppointmentStatistics, CountEntry, StatisticsError};

const NOT_AVAILABLE: &str = "N/A";

fn finish(writer: Writer<Vec<u8>>) -> Result<Vec<u8>, StatisticsError> {
    writer
        .into_inner()
        .map_err(|e| StatisticsError::ExportError(e.to_string()))
}

fn or_fallback(value: Option<&str>, fallback: &str) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => fallback.to_string(),
    }
}

/// Access time on the clinic clock, or the raw value when unparseable.
pub fn log_timestamp(log: &AccessLog) -> String {
    parse_local_datetime(&log.fecha_hora)
        .map(|at| at.format("%d/%m/%Y %H:%M:%S").to_string())
        .unwrap_or_else(|| log.fecha_hora.clone())
}

pub fn logs_csv(logs: &[AccessLog]) -> Result<Vec<u8>, StatisticsError> {
    let mut writer = Writer::from_writer(Vec::new());
    writer.write_record(["Usuario", "Tipo", "Fecha y Hora"])?;

    for log in logs {
        let when = log_timestamp(log);
        writer.write_record([
            or_fallback(Some(&log.usuario_nombre), NOT_AVAILABLE),
            or_fallback(Some(&log.usuario_tipo), NOT_AVAILABLE),
            when,
        ])?;
    }

    finish(writer)
}

pub fn appointments_csv(appointments: &[Appointment]) -> Result<Vec<u8>, StatisticsError> {
    let mut writer = Writer::from_writer(Vec::new());
    writer.write_record([
        "Fecha",
        "Hora",
        "Paciente",
        "Especialista",
        "Especialidad",
        "Estado",
        "Reseña",
        "Calificación",
        "Comentario",
    ])?;

    for appointment in appointments {
        let (fecha, hora) = match appointment.scheduled_at() {
            Some(at) => (at.format("%d/%m/%Y").to_string(), at.format("%H:%M").to_string()),
            None => (appointment.fecha.clone(), NOT_AVAILABLE.to_string()),
        };
        let rating = appointment.calificacionatencion.as_ref();

        writer.write_record([
            fecha,
            hora,
            or_fallback(appointment.pacientenombre.as_deref(), NOT_AVAILABLE),
            or_fallback(appointment.especialistanombre.as_deref(), NOT_AVAILABLE),
            or_fallback(appointment.especialidad.as_deref(), NOT_AVAILABLE),
            status_label(appointment.estado.as_str()),
            or_fallback(appointment.resena.as_deref(), "Sin reseña"),
            rating
                .map(|r| format!("{}/5", r.puntaje))
                .unwrap_or_else(|| "Sin calificar".to_string()),
            or_fallback(rating.map(|r| r.comentario.as_str()), "Sin comentario"),
        ])?;
    }

    finish(writer)
}

fn write_section(
    writer: &mut Writer<Vec<u8>>,
    title: &str,
    headers: [&str; 3],
    entries: &[CountEntry],
) -> Result<(), StatisticsError> {
    writer.write_record([title])?;
    writer.write_record(headers)?;
    for entry in entries {
        writer.write_record([
            entry.nombre.clone(),
            entry.cantidad.to_string(),
            format!("{:.1}%", entry.porcentaje),
        ])?;
    }
    Ok(())
}

/// One CSV with a titled section per aggregate. Sections have different
/// widths, so the writer is flexible.
pub fn statistics_csv(stats: &AppointmentStatistics) -> Result<Vec<u8>, StatisticsError> {
    let mut writer = WriterBuilder::new().flexible(true).from_writer(Vec::new());

    writer.write_record([
        "Período".to_string(),
        format!("{} - {}", stats.desde.format("%d/%m/%Y"), stats.hasta.format("%d/%m/%Y")),
    ])?;

    write_section(
        &mut writer,
        "Por Especialidad",
        ["Especialidad", "Cantidad de Turnos", "Porcentaje"],
        &stats.by_specialty,
    )?;

    writer.write_record(["Por Día"])?;
    writer.write_record(["Fecha", "Cantidad de Turnos"])?;
    for day in &stats.by_day {
        writer.write_record([day.fecha.clone(), day.cantidad.to_string()])?;
    }

    write_section(
        &mut writer,
        "Por Médico",
        ["Médico", "Turnos Solicitados", "Porcentaje"],
        &stats.by_specialist,
    )?;
    write_section(
        &mut writer,
        "Finalizados",
        ["Médico", "Turnos Finalizados", "Porcentaje del Total"],
        &stats.completed_by_specialist,
    )?;

    let summary = &stats.summary;
    writer.write_record(["Resumen General"])?;
    writer.write_record(["Métrica", "Valor"])?;
    for (metric, value) in [
        ("Total de turnos", stats.total.to_string()),
        ("Pendientes", summary.pendientes.to_string()),
        ("Aceptados", summary.aceptados.to_string()),
        ("Realizados", summary.realizados.to_string()),
        ("Cancelados", summary.cancelados.to_string()),
        ("Rechazados", summary.rechazados.to_string()),
        ("Tasa de finalización", format!("{:.1}%", summary.tasa_finalizacion)),
        ("Tasa de cancelación", format!("{:.1}%", summary.tasa_cancelacion)),
    ] {
        writer.write_record([metric.to_string(), value])?;
    }

    finish(writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::aggregate::appointment_statistics;
    use chrono::NaiveDate;
    use serde_json::json;

    fn lines(bytes: Vec<u8>) -> Vec<String> {
        String::from_utf8(bytes).unwrap().lines().map(str::to_string).collect()
    }

    fn completed_appointment() -> Appointment {
        serde_json::from_value(json!({
            "id": "t1",
            "pacienteid": "p1",
            "pacientenombre": "Ana García",
            "especialistaid": "s1",
            "especialistanombre": "Luis Pérez",
            "especialidad": "cardiologia",
            "fecha": "2024-01-15T10:30:00",
            "estado": "realizado",
            "resena": "Control normal",
            "calificacionatencion": { "puntaje": 5, "comentario": "Muy atento, gracias" }
        }))
        .unwrap()
    }

    #[test]
    fn logs_export_formats_timestamps() {
        let logs = vec![AccessLog {
            id: None,
            usuario_id: "u1".to_string(),
            usuario_nombre: "Ana García".to_string(),
            usuario_tipo: "paciente".to_string(),
            fecha_hora: "2024-01-15T10:00:00".to_string(),
        }];

        let rows = lines(logs_csv(&logs).unwrap());
        assert_eq!(rows[0], "Usuario,Tipo,Fecha y Hora");
        assert_eq!(rows[1], "Ana García,paciente,15/01/2024 10:00:00");
    }

    #[test]
    fn appointments_export_uses_fallbacks() {
        let pending: Appointment = serde_json::from_value(json!({
            "id": "t2",
            "pacienteid": "p1",
            "especialistaid": "s1",
            "fecha": "2024-01-16T09:00:00",
            "estado": "pendiente"
        }))
        .unwrap();

        let rows = lines(appointments_csv(&[completed_appointment(), pending]).unwrap());
        assert_eq!(rows[0], "Fecha,Hora,Paciente,Especialista,Especialidad,Estado,Reseña,Calificación,Comentario");
        assert_eq!(
            rows[1],
            "15/01/2024,10:30,Ana García,Luis Pérez,cardiologia,Realizado,Control normal,5/5,\"Muy atento, gracias\""
        );
        assert_eq!(
            rows[2],
            "16/01/2024,09:00,N/A,N/A,N/A,Pendiente,Sin reseña,Sin calificar,Sin comentario"
        );
    }

    #[test]
    fn statistics_export_has_every_section() {
        let day = |d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
        let stats = appointment_statistics(&[completed_appointment()], day(1), day(31));

        let text = String::from_utf8(statistics_csv(&stats).unwrap()).unwrap();
        for section in ["Por Especialidad", "Por Día", "Por Médico", "Finalizados", "Resumen General"] {
            assert!(text.contains(section), "missing section {}", section);
        }
        assert!(text.contains("cardiologia,1,100.0%"));
        assert!(text.contains("15/01/2024,1"));
        assert!(text.contains("Tasa de finalización,100.0%"));
    }
}
