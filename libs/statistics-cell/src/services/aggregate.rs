//! Pure aggregation over appointment rows for the administrator reports.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Utc};

use appointment_cell::{Appointment, AppointmentStatus};

use crate::models::{
    AppointmentStatistics, CountEntry, DateRangeQuery, DayCount, StatisticsError, StatusSummary,
    DEFAULT_RANGE_DAYS, NO_SPECIALIST, NO_SPECIALTY,
};

/// Resolves the requested bounds against `today`. Without bounds the range is
/// the last thirty days up to today.
pub fn resolve_range(query: &DateRangeQuery, today: NaiveDate) -> Result<(NaiveDate, NaiveDate), StatisticsError> {
    let to = query.to.unwrap_or(today);
    let from = query.from.unwrap_or(to - Duration::days(DEFAULT_RANGE_DAYS));

    if from > to {
        return Err(StatisticsError::ValidationError(
            "La fecha inicial no puede ser posterior a la final".to_string(),
        ));
    }
    Ok((from, to))
}

/// Inclusive on both days, from 00:00:00 of `from` to 23:59:59 of `to`.
pub fn in_range(appointment: &Appointment, from: NaiveDate, to: NaiveDate) -> bool {
    appointment
        .scheduled_at()
        .map(|at| at.date() >= from && at.date() <= to)
        .unwrap_or(false)
}

/// UTC instant of local midnight starting `day`. Log timestamps are stored in
/// UTC while days are read on the clinic clock.
pub fn local_day_start(day: NaiveDate) -> DateTime<Utc> {
    let midnight = day.and_time(NaiveTime::MIN);
    Local
        .from_local_datetime(&midnight)
        .earliest()
        .map(|at| at.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}

/// PostgREST filters selecting `column` between local days `from` and `to`,
/// both inclusive.
pub fn utc_day_filters(column: &str, from: Option<NaiveDate>, to: Option<NaiveDate>) -> String {
    let mut filters = String::new();
    if let Some(from) = from {
        filters.push_str(&format!(
            "&{}=gte.{}",
            column,
            local_day_start(from).to_rfc3339_opts(SecondsFormat::Secs, true)
        ));
    }
    if let Some(to) = to {
        filters.push_str(&format!(
            "&{}=lt.{}",
            column,
            local_day_start(to + Duration::days(1)).to_rfc3339_opts(SecondsFormat::Secs, true)
        ));
    }
    filters
}

pub fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (count as f64 * 1000.0 / total as f64).round() / 10.0
}

fn label(value: Option<&str>, fallback: &str) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => fallback.to_string(),
    }
}

/// Counts per key, largest first and then by name. Percentages are of `total`.
fn count_by<I>(keys: I, total: usize) -> Vec<CountEntry>
where
    I: IntoIterator<Item = String>,
{
    let mut counts: HashMap<String, usize> = HashMap::new();
    for key in keys {
        *counts.entry(key).or_default() += 1;
    }

    let mut entries: Vec<CountEntry> = counts
        .into_iter()
        .map(|(nombre, cantidad)| CountEntry { porcentaje: percentage(cantidad, total), nombre, cantidad })
        .collect();
    entries.sort_by(|a, b| b.cantidad.cmp(&a.cantidad).then_with(|| a.nombre.cmp(&b.nombre)));
    entries
}

pub fn by_specialty(appointments: &[&Appointment]) -> Vec<CountEntry> {
    count_by(
        appointments.iter().map(|a| label(a.especialidad.as_deref(), NO_SPECIALTY)),
        appointments.len(),
    )
}

pub fn by_specialist(appointments: &[&Appointment]) -> Vec<CountEntry> {
    count_by(
        appointments.iter().map(|a| label(a.especialistanombre.as_deref(), NO_SPECIALIST)),
        appointments.len(),
    )
}

/// Completed appointments per specialist, percentages of all completed ones.
pub fn completed_by_specialist(appointments: &[&Appointment]) -> Vec<CountEntry> {
    let completed: Vec<&Appointment> = appointments
        .iter()
        .copied()
        .filter(|a| a.estado == AppointmentStatus::Completed)
        .collect();
    by_specialist(&completed)
}

pub fn by_day(appointments: &[&Appointment]) -> Vec<DayCount> {
    let mut days: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for at in appointments.iter().filter_map(|a| a.scheduled_at()) {
        *days.entry(at.date()).or_default() += 1;
    }
    days.into_iter()
        .map(|(day, cantidad)| DayCount { fecha: day.format("%d/%m/%Y").to_string(), cantidad })
        .collect()
}

pub fn status_summary(appointments: &[&Appointment]) -> StatusSummary {
    let mut summary = StatusSummary::default();
    for appointment in appointments {
        match appointment.estado {
            AppointmentStatus::Pending => summary.pendientes += 1,
            AppointmentStatus::Accepted => summary.aceptados += 1,
            AppointmentStatus::Completed => summary.realizados += 1,
            AppointmentStatus::Cancelled => summary.cancelados += 1,
            AppointmentStatus::Rejected => summary.rechazados += 1,
        }
    }
    summary.tasa_finalizacion = percentage(summary.realizados, appointments.len());
    summary.tasa_cancelacion = percentage(summary.cancelados, appointments.len());
    summary
}

pub fn appointment_statistics(appointments: &[Appointment], from: NaiveDate, to: NaiveDate) -> AppointmentStatistics {
    let selected: Vec<&Appointment> = appointments.iter().filter(|a| in_range(a, from, to)).collect();

    AppointmentStatistics {
        desde: from,
        hasta: to,
        total: selected.len(),
        by_specialty: by_specialty(&selected),
        by_day: by_day(&selected),
        by_specialist: by_specialist(&selected),
        completed_by_specialist: completed_by_specialist(&selected),
        summary: status_summary(&selected),
    }
}
