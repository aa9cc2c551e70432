use chrono::NaiveDate;

use profile_cell::Profile;
use shared_utils::format::{format_date_full, format_date_long, format_time_12h};
use shared_utils::pdf::PdfReport;

use crate::models::{ClinicalRecordError, RecordEntry};

pub const PDF_TITLE: &str = "Historia Clínica";

fn or_na(value: Option<&str>) -> &str {
    value.map(str::trim).filter(|v| !v.is_empty()).unwrap_or("N/A")
}

fn measure(value: Option<f64>, unit: &str) -> String {
    value
        .map(|v| format!("{} {}", v, unit))
        .unwrap_or_else(|| "N/A".to_string())
}

/// Renders a patient's full history as PDF bytes.
pub fn render_patient_history(
    patient: &Profile,
    entries: &[RecordEntry],
    issued_on: NaiveDate,
) -> Result<Vec<u8>, ClinicalRecordError> {
    let mut writer = PdfReport::new(PDF_TITLE).map_err(ClinicalRecordError::PdfError)?;

    writer.line(PDF_TITLE, 18.0, 0.0, true);
    writer.line(&format!("Fecha de emisión: {}", format_date_full(issued_on)), 10.0, 0.0, false);
    writer.gap(6.0);

    writer.line("Datos del paciente", 12.0, 0.0, true);
    writer.line(&format!("Nombre: {}", patient.nombre), 10.0, 5.0, false);
    writer.line(&format!("Apellido: {}", patient.apellido), 10.0, 5.0, false);
    writer.line(&format!("Email: {}", patient.email), 10.0, 5.0, false);
    writer.line(&format!("DNI: {}", or_na(patient.dni.as_deref())), 10.0, 5.0, false);
    writer.line(&format!("Obra social: {}", or_na(patient.obra_social.as_deref())), 10.0, 5.0, false);
    writer.gap(6.0);

    writer.line("Atenciones", 12.0, 0.0, true);
    if entries.is_empty() {
        writer.line("Sin registros", 10.0, 5.0, false);
    }

    for entry in entries {
        let record = &entry.historia;
        let when = record
            .attended_at()
            .map(|at| format!("{} {}", format_date_long(at.date()), format_time_12h(at.time())))
            .unwrap_or_else(|| record.fecha_atencion.clone());
        let specialist = entry
            .especialista
            .as_ref()
            .map(Profile::full_name)
            .unwrap_or_else(|| record.especialista_id.clone());

        writer.gap(3.0);
        writer.line(&when, 11.0, 0.0, true);
        writer.line(&format!("Especialista: {}", specialist), 10.0, 5.0, false);
        writer.line(&format!("Altura: {}", measure(record.altura, "m")), 10.0, 5.0, false);
        writer.line(&format!("Peso: {}", measure(record.peso, "kg")), 10.0, 5.0, false);
        writer.line(&format!("Temperatura: {}", measure(record.temperatura, "°C")), 10.0, 5.0, false);
        writer.line(&format!("Presión: {}", or_na(record.presion.as_deref())), 10.0, 5.0, false);
        for field in record.fields() {
            writer.line(&format!("{}: {}", field.clave, field.valor), 10.0, 5.0, false);
        }
    }

    writer.finish().map_err(ClinicalRecordError::PdfError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record_from_row;
    use serde_json::json;

    fn patient() -> Profile {
        serde_json::from_value(json!({
            "user_id": "p1",
            "nombre": "Ana",
            "apellido": "García",
            "email": "ana@clinica.com",
            "tipo": "paciente",
            "dni": "30123456",
            "obra_social": "OSDE"
        }))
        .unwrap()
    }

    fn entry(turno: &str) -> RecordEntry {
        RecordEntry::bare(
            record_from_row(json!({
                "id": format!("h-{}", turno),
                "paciente_id": "p1",
                "especialista_id": "s1",
                "turno_id": turno,
                "fecha_atencion": "2024-01-15T10:00:00",
                "altura": 1.7,
                "peso": 70.5,
                "temperatura": 36.6,
                "presion": "120/80",
                "datos_dinamicos": [{ "clave": "caries", "valor": "4" }]
            }))
            .unwrap(),
        )
    }

    #[test]
    fn renders_a_pdf_document() {
        let issued = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let bytes = render_patient_history(&patient(), &[entry("t1")], issued).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn long_histories_span_pages() {
        let issued = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let entries: Vec<RecordEntry> = (0..40).map(|i| entry(&format!("t{}", i))).collect();
        let bytes = render_patient_history(&patient(), &entries, issued).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn missing_values_read_na() {
        assert_eq!(or_na(Some("  ")), "N/A");
        assert_eq!(measure(None, "kg"), "N/A");
        assert_eq!(measure(Some(70.0), "kg"), "70 kg");
    }
}
