//! Appointment slot generation.
//!
//! Availability windows are split into fixed 30 minute slots. A slot is free
//! when no active appointment starts at the same minute.

use std::collections::BTreeSet;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use shared_utils::format::format_date_long;

use crate::models::{Availability, AvailableDay, TimeSlot, TimeWindow};

pub const SLOT_MINUTES: u32 = 30;

/// Appointment states that keep a slot taken.
pub const OCCUPYING_STATES: [&str; 3] = ["pendiente", "aceptado", "realizado"];

fn minutes_of(time: NaiveTime) -> u32 {
    time.num_seconds_from_midnight() / 60
}

fn time_from_minutes(minutes: u32) -> Option<NaiveTime> {
    NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0)
}

/// Consecutive slots `[t, t + 30)` starting at `start` while `t + 30 <= end`.
pub fn generate_slots(start: NaiveTime, end: NaiveTime) -> Vec<TimeSlot> {
    let end_minutes = minutes_of(end);
    let mut current = minutes_of(start);
    let mut slots = Vec::new();

    while current + SLOT_MINUTES <= end_minutes {
        if let (Some(slot_start), Some(slot_end)) =
            (time_from_minutes(current), time_from_minutes(current + SLOT_MINUTES))
        {
            slots.push(TimeSlot { start: slot_start, end: slot_end });
        }
        current += SLOT_MINUTES;
    }

    slots
}

/// Windows of `specialty` that fall on the weekday of `date`.
pub fn windows_for_date(availability: &[Availability], specialty: &str, date: NaiveDate) -> Vec<TimeWindow> {
    availability
        .iter()
        .filter(|a| a.is_for_specialty(specialty))
        .filter(|a| a.weekday() == Some(date.weekday()))
        .filter_map(Availability::window)
        .collect()
}

/// Dates in `[today, today + horizon)` with at least one window for `specialty`.
pub fn upcoming_days(
    availability: &[Availability],
    specialty: &str,
    today: NaiveDate,
    horizon_days: u32,
) -> Vec<AvailableDay> {
    (0..horizon_days as i64)
        .map(|offset| today + Duration::days(offset))
        .filter_map(|date| {
            let ventanas = windows_for_date(availability, specialty, date);
            if ventanas.is_empty() {
                None
            } else {
                Some(AvailableDay {
                    fecha: date,
                    etiqueta: format_date_long(date),
                    ventanas,
                })
            }
        })
        .collect()
}

/// Slots of every window minus the booked start times, sorted and deduplicated.
pub fn free_slots(windows: &[TimeWindow], booked_starts: &[NaiveTime]) -> Vec<TimeSlot> {
    let booked: BTreeSet<u32> = booked_starts.iter().map(|t| minutes_of(*t)).collect();

    windows
        .iter()
        .flat_map(|w| generate_slots(w.start, w.end))
        .filter(|slot| !booked.contains(&minutes_of(slot.start)))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn within_horizon(date: NaiveDate, today: NaiveDate, horizon_days: u32) -> bool {
    date >= today && date < today + Duration::days(horizon_days as i64)
}

/// Free slots of `specialty` on `date`, as seen at `now`.
///
/// Dates outside the booking horizon have no slots, and on the current day
/// only slots starting after `now` are offered.
pub fn slots_for_date(
    availability: &[Availability],
    specialty: &str,
    date: NaiveDate,
    booked_starts: &[NaiveTime],
    now: NaiveDateTime,
    horizon_days: u32,
) -> Vec<TimeSlot> {
    if !within_horizon(date, now.date(), horizon_days) {
        return Vec::new();
    }

    let windows = windows_for_date(availability, specialty, date);
    let mut slots = free_slots(&windows, booked_starts);

    if date == now.date() {
        slots.retain(|slot| slot.start > now.time());
    }

    slots
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn window(dia: &str, especialidad: &str, start: &str, end: &str) -> Availability {
        Availability {
            id: None,
            especialista_id: "spec-1".to_string(),
            especialidad: especialidad.to_string(),
            dia: dia.to_string(),
            hora_inicio: start.to_string(),
            hora_fin: end.to_string(),
        }
    }

    // 2024-01-15 is a Monday
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    #[test]
    fn splits_window_into_half_hours() {
        let slots = generate_slots(t(8, 0), t(10, 0));
        let starts: Vec<NaiveTime> = slots.iter().map(|s| s.start).collect();
        assert_eq!(starts, vec![t(8, 0), t(8, 30), t(9, 0), t(9, 30)]);
        assert_eq!(slots.last().unwrap().end, t(10, 0));
    }

    #[test]
    fn drops_trailing_partial_slot() {
        let slots = generate_slots(t(8, 0), t(9, 15));
        assert_eq!(slots.len(), 2);
        assert!(generate_slots(t(8, 0), t(8, 20)).is_empty());
        assert!(generate_slots(t(10, 0), t(9, 0)).is_empty());
    }

    #[test]
    fn excludes_booked_starts_and_merges_windows() {
        let windows = vec![
            TimeWindow { start: t(9, 0), end: t(10, 0) },
            TimeWindow { start: t(9, 30), end: t(11, 0) },
        ];
        let slots = free_slots(&windows, &[t(9, 30)]);
        let starts: Vec<NaiveTime> = slots.iter().map(|s| s.start).collect();
        assert_eq!(starts, vec![t(9, 0), t(10, 0), t(10, 30)]);
    }

    #[test]
    fn upcoming_days_follow_weekday_and_specialty() {
        let availability = vec![
            window("Lunes", "cardiologia", "08:00", "10:00"),
            window("Miércoles", "cardiologia", "14:00", "16:00"),
            window("Martes", "pediatria", "08:00", "12:00"),
        ];

        let days = upcoming_days(&availability, "cardiologia", monday(), 15);
        let dates: Vec<u32> = days.iter().map(|d| d.fecha.day()).collect();
        assert_eq!(dates, vec![15, 17, 22, 24, 29]);
        assert_eq!(days[0].etiqueta, "15 de Enero de 2024 (Lunes)");
    }

    #[test]
    fn horizon_limits_slots() {
        let availability = vec![window("Lunes", "cardiologia", "08:00", "09:00")];
        let now = monday().and_hms_opt(7, 0, 0).unwrap();

        let today = slots_for_date(&availability, "cardiologia", monday(), &[], now, 15);
        assert_eq!(today.len(), 2);

        let last_day = monday() + Duration::days(14);
        assert_eq!(slots_for_date(&availability, "cardiologia", last_day, &[], now, 15).len(), 2);

        let beyond = monday() + Duration::days(21);
        assert!(slots_for_date(&availability, "cardiologia", beyond, &[], now, 15).is_empty());

        let past = monday() - Duration::days(7);
        assert!(slots_for_date(&availability, "cardiologia", past, &[], now, 15).is_empty());
    }

    #[test]
    fn today_only_offers_future_slots() {
        let availability = vec![window("Lunes", "cardiologia", "08:00", "10:00")];
        let now = monday().and_hms_opt(8, 45, 0).unwrap();
        let slots = slots_for_date(&availability, "cardiologia", monday(), &[t(9, 30)], now, 15);
        let starts: Vec<NaiveTime> = slots.iter().map(|s| s.start).collect();
        assert_eq!(starts, vec![t(9, 0)]);
    }
}
