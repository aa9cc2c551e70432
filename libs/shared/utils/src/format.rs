use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};

const MONTHS: [&str; 12] = [
    "Enero", "Febrero", "Marzo", "Abril", "Mayo", "Junio",
    "Julio", "Agosto", "Septiembre", "Octubre", "Noviembre", "Diciembre",
];

/// Display label for a stored appointment status. Unknown values pass through.
pub fn status_label(status: &str) -> String {
    match status {
        "pendiente" => "Pendiente",
        "confirmado" => "Confirmado",
        "aceptado" => "Aceptado",
        "realizado" => "Realizado",
        "rechazado" => "Rechazado",
        "cancelado" => "Cancelado",
        other => other,
    }
    .to_string()
}

/// Specialty names compare trimmed and case-insensitively, accents included.
pub fn same_specialty(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

pub fn spanish_weekday(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Lunes",
        Weekday::Tue => "Martes",
        Weekday::Wed => "Miércoles",
        Weekday::Thu => "Jueves",
        Weekday::Fri => "Viernes",
        Weekday::Sat => "Sábado",
        Weekday::Sun => "Domingo",
    }
}

/// Accepts the weekday names with or without accents, in any case.
pub fn parse_spanish_weekday(name: &str) -> Option<Weekday> {
    let normalized: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' => 'a',
            'é' => 'e',
            'í' => 'i',
            'ó' => 'o',
            'ú' => 'u',
            other => other,
        })
        .collect();

    match normalized.as_str() {
        "lunes" => Some(Weekday::Mon),
        "martes" => Some(Weekday::Tue),
        "miercoles" => Some(Weekday::Wed),
        "jueves" => Some(Weekday::Thu),
        "viernes" => Some(Weekday::Fri),
        "sabado" => Some(Weekday::Sat),
        "domingo" => Some(Weekday::Sun),
        _ => None,
    }
}

fn month_name(date: NaiveDate) -> &'static str {
    MONTHS[date.month0() as usize]
}

/// "15 de Enero de 2024 (Lunes)"
pub fn format_date_long(date: NaiveDate) -> String {
    format!(
        "{} de {} de {} ({})",
        date.day(),
        month_name(date),
        date.year(),
        spanish_weekday(date.weekday())
    )
}

/// "15/1/2024"
pub fn format_date_short(date: NaiveDate) -> String {
    format!("{}/{}/{}", date.day(), date.month(), date.year())
}

/// "Lunes, 15 de Enero de 2024"
pub fn format_date_full(date: NaiveDate) -> String {
    format!(
        "{}, {} de {} de {}",
        spanish_weekday(date.weekday()),
        date.day(),
        month_name(date),
        date.year()
    )
}

/// "9:30am", "2:00pm"
pub fn format_time_12h(time: NaiveTime) -> String {
    let (is_pm, hour) = time.hour12();
    format!(
        "{}:{:02}{}",
        hour,
        time.minute(),
        if is_pm { "pm" } else { "am" }
    )
}

/// Parses a stored appointment timestamp as local wall-clock time.
///
/// Accepts `YYYY-MM-DDTHH:MM[:SS[.fff]]` without offset (taken as local) and
/// RFC 3339 values with offset (converted to local).
pub fn parse_local_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, pattern) {
            return Some(parsed);
        }
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Local).naive_local())
}

/// Accepts `HH:MM` or `HH:MM:SS`.
pub fn parse_clock_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn specialties_match_across_accented_case() {
        assert!(same_specialty("Cardiología", " CARDIOLOGÍA "));
        assert!(same_specialty("pediatria", "Pediatria"));
        assert!(!same_specialty("Cardiología", "cardiologia"));
    }

    #[test]
    fn formats_dates_in_spanish() {
        let d = date(2024, 1, 15);
        assert_eq!(format_date_long(d), "15 de Enero de 2024 (Lunes)");
        assert_eq!(format_date_short(d), "15/1/2024");
        assert_eq!(format_date_full(d), "Lunes, 15 de Enero de 2024");
    }

    #[test]
    fn formats_twelve_hour_times() {
        assert_eq!(format_time_12h(NaiveTime::from_hms_opt(9, 30, 0).unwrap()), "9:30am");
        assert_eq!(format_time_12h(NaiveTime::from_hms_opt(14, 0, 0).unwrap()), "2:00pm");
        assert_eq!(format_time_12h(NaiveTime::from_hms_opt(12, 0, 0).unwrap()), "12:00pm");
        assert_eq!(format_time_12h(NaiveTime::from_hms_opt(0, 15, 0).unwrap()), "12:15am");
    }

    #[test]
    fn weekday_names_round_trip() {
        assert_eq!(parse_spanish_weekday("Miércoles"), Some(Weekday::Wed));
        assert_eq!(parse_spanish_weekday("sabado"), Some(Weekday::Sat));
        assert_eq!(parse_spanish_weekday("Funday"), None);
        assert_eq!(spanish_weekday(Weekday::Sat), "Sábado");
    }

    #[test]
    fn parses_stored_timestamps() {
        let expected = date(2024, 1, 15).and_hms_opt(9, 30, 0).unwrap();
        assert_eq!(parse_local_datetime("2024-01-15T09:30:00"), Some(expected));
        assert_eq!(parse_local_datetime("2024-01-15T09:30"), Some(expected));
        assert_eq!(parse_local_datetime("2024-01-15T09:30:00.000"), Some(expected));
        assert!(parse_local_datetime("2024-01-15T09:30:00Z").is_some());
        assert_eq!(parse_local_datetime("ayer"), None);
        assert_eq!(parse_clock_time("08:00"), NaiveTime::from_hms_opt(8, 0, 0));
        assert_eq!(parse_clock_time("18:30:00"), NaiveTime::from_hms_opt(18, 30, 0));
    }

    #[test]
    fn status_labels() {
        assert_eq!(status_label("realizado"), "Realizado");
        assert_eq!(status_label("otro"), "otro");
    }
}
