use std::env;

use chrono::{NaiveTime, Weekday};
use tracing::warn;

/// Opening hours used to validate specialist availability windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClinicHours {
    pub weekday_open: NaiveTime,
    pub weekday_close: NaiveTime,
    pub saturday_open: NaiveTime,
    pub saturday_close: NaiveTime,
}

impl ClinicHours {
    /// Opening and closing time for a weekday, `None` when the clinic is closed.
    pub fn for_weekday(&self, day: Weekday) -> Option<(NaiveTime, NaiveTime)> {
        match day {
            Weekday::Sun => None,
            Weekday::Sat => Some((self.saturday_open, self.saturday_close)),
            _ => Some((self.weekday_open, self.weekday_close)),
        }
    }

    pub fn contains(&self, day: Weekday, start: NaiveTime, end: NaiveTime) -> bool {
        match self.for_weekday(day) {
            Some((open, close)) => start >= open && end <= close,
            None => false,
        }
    }
}

impl Default for ClinicHours {
    fn default() -> Self {
        Self {
            weekday_open: hm(8, 0),
            weekday_close: hm(19, 0),
            saturday_open: hm(8, 0),
            saturday_close: hm(14, 0),
        }
    }
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub profile_images_bucket: String,
    pub clinic_hours: ClinicHours,
    pub booking_horizon_days: u32,
    pub server_port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_jwt_secret: String::new(),
            profile_images_bucket: "perfiles".to_string(),
            clinic_hours: ClinicHours::default(),
            booking_horizon_days: 15,
            server_port: 3000,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let default_hours = defaults.clinic_hours;

        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            profile_images_bucket: env::var("PROFILE_IMAGES_BUCKET")
                .unwrap_or(defaults.profile_images_bucket),
            clinic_hours: ClinicHours {
                weekday_open: time_from_env("CLINIC_OPENING_TIME", default_hours.weekday_open),
                weekday_close: time_from_env("CLINIC_CLOSING_TIME", default_hours.weekday_close),
                saturday_open: time_from_env("CLINIC_SATURDAY_OPENING_TIME", default_hours.saturday_open),
                saturday_close: time_from_env("CLINIC_SATURDAY_CLOSING_TIME", default_hours.saturday_close),
            },
            booking_horizon_days: parsed_from_env("BOOKING_HORIZON_DAYS", defaults.booking_horizon_days),
            server_port: parsed_from_env("SERVER_PORT", defaults.server_port),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }
}

fn time_from_env(key: &str, default: NaiveTime) -> NaiveTime {
    match env::var(key) {
        Ok(value) => NaiveTime::parse_from_str(value.trim(), "%H:%M").unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using {}", key, value, default.format("%H:%M"));
            default
        }),
        Err(_) => default,
    }
}

fn parsed_from_env<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display + Copy,
{
    match env::var(key) {
        Ok(value) => value.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using {}", key, value, default);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clinic_hours_close_on_sunday() {
        let hours = ClinicHours::default();
        assert_eq!(hours.for_weekday(Weekday::Sun), None);
        assert!(!hours.contains(Weekday::Sun, hm(9, 0), hm(10, 0)));
    }

    #[test]
    fn saturday_uses_short_schedule() {
        let hours = ClinicHours::default();
        assert!(hours.contains(Weekday::Sat, hm(8, 0), hm(14, 0)));
        assert!(!hours.contains(Weekday::Sat, hm(13, 0), hm(15, 0)));
        assert!(hours.contains(Weekday::Mon, hm(13, 0), hm(19, 0)));
        assert!(!hours.contains(Weekday::Mon, hm(7, 30), hm(9, 0)));
    }

    #[test]
    fn default_config_is_not_configured() {
        let config = AppConfig::default();
        assert!(!config.is_configured());
        assert_eq!(config.booking_horizon_days, 15);
        assert_eq!(config.profile_images_bucket, "perfiles");
    }
}
