//! Printable statistics report: the access log followed by appointments per
//! specialty on a page of its own.

use chrono::NaiveDate;

use shared_utils::format::format_date_full;
use shared_utils::pdf::PdfReport;

use crate::models::{AccessLog, AppointmentStatistics, StatisticsError};
use crate::services::export::log_timestamp;

pub const REPORT_TITLE: &str = "Estadísticas de la Clínica";

pub fn statistics_pdf(
    logs: &[AccessLog],
    stats: &AppointmentStatistics,
    issued_on: NaiveDate,
) -> Result<Vec<u8>, StatisticsError> {
    let mut report = PdfReport::new(REPORT_TITLE).map_err(StatisticsError::ExportError)?;

    report.line(REPORT_TITLE, 18.0, 0.0, true);
    report.line(&format!("Fecha de emisión: {}", format_date_full(issued_on)), 12.0, 0.0, false);
    report.line(
        &format!("Período: {} - {}", stats.desde.format("%d/%m/%Y"), stats.hasta.format("%d/%m/%Y")),
        10.0,
        0.0,
        false,
    );
    report.rule();

    report.line("Log de Ingresos al Sistema", 14.0, 0.0, true);
    if logs.is_empty() {
        report.line("Sin ingresos registrados", 10.0, 0.0, false);
    }
    for (index, log) in logs.iter().enumerate() {
        report.line(
            &format!("{}. {} ({}) - {}", index + 1, log.usuario_nombre, log.usuario_tipo, log_timestamp(log)),
            10.0,
            0.0,
            false,
        );
    }

    report.page_break();
    report.line("Turnos por Especialidad", 18.0, 0.0, true);
    report.rule();
    if stats.by_specialty.is_empty() {
        report.line("Sin turnos en el período", 10.0, 0.0, false);
    }
    for entry in &stats.by_specialty {
        report.line(&format!("{}: {}", entry.nombre, entry.cantidad), 10.0, 0.0, false);
    }
    report.gap(4.0);
    report.line(&format!("Total de turnos: {}", stats.total), 10.0, 0.0, true);

    report.finish().map_err(StatisticsError::ExportError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::aggregate::appointment_statistics;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn log(n: usize) -> AccessLog {
        AccessLog {
            id: None,
            usuario_id: format!("u{}", n),
            usuario_nombre: "Ana García".to_string(),
            usuario_tipo: "paciente".to_string(),
            fecha_hora: "2024-01-15T10:00:00".to_string(),
        }
    }

    #[test]
    fn renders_an_empty_report() {
        let stats = appointment_statistics(&[], day(1), day(31));
        let bytes = statistics_pdf(&[], &stats, day(31)).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn long_access_logs_span_pages() {
        let logs: Vec<AccessLog> = (0..120).map(log).collect();
        let stats = appointment_statistics(&[], day(1), day(31));
        let bytes = statistics_pdf(&logs, &stats, day(31)).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
