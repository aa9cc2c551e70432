use chrono::{Local, NaiveDate, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use appointment_cell::Appointment;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::role::Role;

use crate::models::{AccessLog, AppointmentStatistics, DateRangeQuery, StatisticsError};
use crate::services::{aggregate, export, report};

pub struct StatisticsService {
    supabase: SupabaseClient,
}

impl StatisticsService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    fn today() -> NaiveDate {
        Local::now().date_naive()
    }

    // ==========================================================================
    // ACCESS LOG
    // ==========================================================================

    pub async fn record_access(
        &self,
        user_id: &str,
        user_name: &str,
        role: Role,
        auth_token: &str,
    ) -> Result<(), StatisticsError> {
        let row = json!({
            "usuario_id": user_id,
            "usuario_nombre": user_name,
            "usuario_tipo": role.as_str(),
            "fecha_hora": Utc::now().to_rfc3339(),
        });

        self.supabase
            .request_empty(Method::POST, "/rest/v1/logs_ingresos", Some(auth_token), Some(row))
            .await
            .map_err(|e| StatisticsError::DatabaseError(e.to_string()))?;

        info!("Access recorded for {} ({})", user_id, role);
        Ok(())
    }

    /// Access log entries, newest first, optionally bounded by day.
    pub async fn list_logs(&self, range: &DateRangeQuery, auth_token: &str) -> Result<Vec<AccessLog>, StatisticsError> {
        if let (Some(from), Some(to)) = (range.from, range.to) {
            if from > to {
                return Err(StatisticsError::ValidationError(
                    "La fecha inicial no puede ser posterior a la final".to_string(),
                ));
            }
        }

        let path = format!(
            "/rest/v1/logs_ingresos?order=fecha_hora.desc{}",
            aggregate::utc_day_filters("fecha_hora", range.from, range.to)
        );

        let rows: Vec<Value> = self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| StatisticsError::DatabaseError(e.to_string()))?;

        let logs: Vec<AccessLog> = rows
            .into_iter()
            .filter_map(|row| match serde_json::from_value::<AccessLog>(row) {
                Ok(log) => Some(log),
                Err(e) => {
                    warn!("Skipping malformed access log row: {}", e);
                    None
                }
            })
            .collect();

        debug!("Loaded {} access log entries", logs.len());
        Ok(logs)
    }

    // ==========================================================================
    // APPOINTMENTS
    // ==========================================================================

    /// Appointments ordered by date. Bounds are inclusive days.
    async fn fetch_appointments(
        &self,
        bounds: Option<(NaiveDate, NaiveDate)>,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, StatisticsError> {
        let mut path = "/rest/v1/turnos?order=fecha.asc".to_string();
        if let Some((from, to)) = bounds {
            path.push_str(&format!("&fecha=gte.{}T00:00:00&fecha=lte.{}T23:59:59", from, to));
        }

        let rows: Vec<Value> = self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| StatisticsError::DatabaseError(e.to_string()))?;

        Ok(rows
            .into_iter()
            .filter_map(|row| match serde_json::from_value::<Appointment>(row) {
                Ok(a) => Some(a),
                Err(e) => {
                    warn!("Skipping malformed appointment row: {}", e);
                    None
                }
            })
            .collect())
    }

    pub async fn appointment_statistics(
        &self,
        range: &DateRangeQuery,
        auth_token: &str,
    ) -> Result<AppointmentStatistics, StatisticsError> {
        let (from, to) = aggregate::resolve_range(range, Self::today())?;
        let appointments = self.fetch_appointments(Some((from, to)), auth_token).await?;

        let stats = aggregate::appointment_statistics(&appointments, from, to);
        info!("Statistics for {} - {}: {} appointments", from, to, stats.total);
        Ok(stats)
    }

    // ==========================================================================
    // EXPORTS
    // ==========================================================================

    pub async fn export_logs(&self, range: &DateRangeQuery, auth_token: &str) -> Result<Vec<u8>, StatisticsError> {
        let logs = self.list_logs(range, auth_token).await?;
        export::logs_csv(&logs)
    }

    /// Every appointment when no bounds are given.
    pub async fn export_appointments(&self, range: &DateRangeQuery, auth_token: &str) -> Result<Vec<u8>, StatisticsError> {
        let bounds = if range.is_open() {
            None
        } else {
            Some(aggregate::resolve_range(range, Self::today())?)
        };
        let appointments = self.fetch_appointments(bounds, auth_token).await?;
        export::appointments_csv(&appointments)
    }

    pub async fn export_statistics(&self, range: &DateRangeQuery, auth_token: &str) -> Result<Vec<u8>, StatisticsError> {
        let stats = self.appointment_statistics(range, auth_token).await?;
        export::statistics_csv(&stats)
    }

    /// Access log and specialty counts over the same resolved range.
    pub async fn export_statistics_pdf(&self, range: &DateRangeQuery, auth_token: &str) -> Result<Vec<u8>, StatisticsError> {
        let today = Self::today();
        let (from, to) = aggregate::resolve_range(range, today)?;
        let resolved = DateRangeQuery { from: Some(from), to: Some(to) };

        let logs = self.list_logs(&resolved, auth_token).await?;
        let stats = self.appointment_statistics(&resolved, auth_token).await?;
        report::statistics_pdf(&logs, &stats, today)
    }
}
