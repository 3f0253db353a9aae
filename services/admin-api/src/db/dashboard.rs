//! Dashboard aggregation queries.
//!
//! Read-only counts and sums over the active records, matching what the
//! original dashboard screens showed.

use carelane_id::AppointmentId;
use chrono::{NaiveDate, NaiveTime};
use sqlx::{postgres::PgPool, postgres::PgRow, Row};

use super::DbError;

/// Top-line totals for the dashboard.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DashboardSummary {
    pub total_patients: i64,
    pub total_appointments: i64,
    pub total_procedures: i64,
    /// Completed lab tests only.
    pub total_lab_reports: i64,
    /// Sum of paid transaction totals, in cents.
    pub total_revenue_cents: i64,
}

/// Counts of records created or dated within one month.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MonthlyStatistics {
    pub month: u32,
    pub year: i32,
    pub appointments: i64,
    pub patients: i64,
    pub procedures: i64,
    pub lab_tests: i64,
    /// Paid revenue for the month, in cents.
    pub revenue_cents: i64,
}

/// One appointment on the daily schedule view.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DailyAppointmentRow {
    pub appointment_id: AppointmentId,
    pub appointment_number: String,
    pub patient_name: String,
    pub doctor_name: Option<String>,
    pub appointment_time: NaiveTime,
    pub appointment_type: String,
    pub status: String,
}

impl<'r> sqlx::FromRow<'r, PgRow> for DailyAppointmentRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            appointment_id: AppointmentId::new(row.try_get("appointment_id")?),
            appointment_number: row.try_get("appointment_number")?,
            patient_name: row.try_get("patient_name")?,
            doctor_name: row.try_get("doctor_name")?,
            appointment_time: row.try_get("appointment_time")?,
            appointment_type: row.try_get("appointment_type")?,
            status: row.try_get("status")?,
        })
    }
}

/// Store for dashboard aggregates.
#[derive(Clone)]
pub struct DashboardStore {
    pool: PgPool,
}

impl DashboardStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Top-line totals across all active records.
    pub async fn summary(&self) -> Result<DashboardSummary, DbError> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT count(*) FROM patients WHERE is_active) AS total_patients,
                (SELECT count(*) FROM appointments WHERE is_active) AS total_appointments,
                (SELECT count(*) FROM procedures WHERE is_active) AS total_procedures,
                (SELECT count(*) FROM lab_tests WHERE is_active AND status = 'completed')
                    AS total_lab_reports,
                (SELECT COALESCE(sum(total_cents), 0) FROM transactions
                    WHERE is_active AND status = 'paid') AS total_revenue_cents
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::Query)?;

        Ok(DashboardSummary {
            total_patients: row.try_get("total_patients").map_err(DbError::Query)?,
            total_appointments: row.try_get("total_appointments").map_err(DbError::Query)?,
            total_procedures: row.try_get("total_procedures").map_err(DbError::Query)?,
            total_lab_reports: row.try_get("total_lab_reports").map_err(DbError::Query)?,
            total_revenue_cents: row.try_get("total_revenue_cents").map_err(DbError::Query)?,
        })
    }

    /// Per-month activity counts and paid revenue.
    pub async fn monthly_statistics(
        &self,
        month: u32,
        year: i32,
    ) -> Result<MonthlyStatistics, DbError> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT count(*) FROM appointments
                    WHERE is_active
                      AND EXTRACT(MONTH FROM appointment_date) = $1
                      AND EXTRACT(YEAR FROM appointment_date) = $2) AS appointments,
                (SELECT count(*) FROM patients
                    WHERE is_active
                      AND EXTRACT(MONTH FROM created_at) = $1
                      AND EXTRACT(YEAR FROM created_at) = $2) AS patients,
                (SELECT count(*) FROM procedures
                    WHERE is_active
                      AND EXTRACT(MONTH FROM procedure_date) = $1
                      AND EXTRACT(YEAR FROM procedure_date) = $2) AS procedures,
                (SELECT count(*) FROM lab_tests
                    WHERE is_active
                      AND EXTRACT(MONTH FROM test_date) = $1
                      AND EXTRACT(YEAR FROM test_date) = $2) AS lab_tests,
                (SELECT COALESCE(sum(total_cents), 0) FROM transactions
                    WHERE is_active AND status = 'paid'
                      AND EXTRACT(MONTH FROM transaction_date) = $1
                      AND EXTRACT(YEAR FROM transaction_date) = $2) AS revenue_cents
            "#,
        )
        .bind(month as i32)
        .bind(year)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::Query)?;

        Ok(MonthlyStatistics {
            month,
            year,
            appointments: row.try_get("appointments").map_err(DbError::Query)?,
            patients: row.try_get("patients").map_err(DbError::Query)?,
            procedures: row.try_get("procedures").map_err(DbError::Query)?,
            lab_tests: row.try_get("lab_tests").map_err(DbError::Query)?,
            revenue_cents: row.try_get("revenue_cents").map_err(DbError::Query)?,
        })
    }

    /// The day's active appointments, ordered by time.
    pub async fn daily_appointments(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<DailyAppointmentRow>, DbError> {
        sqlx::query_as::<_, DailyAppointmentRow>(
            r#"
            SELECT a.appointment_id, a.appointment_number,
                   p.first_name || ' ' || p.last_name AS patient_name,
                   d.first_name || ' ' || d.last_name AS doctor_name,
                   a.appointment_time, a.appointment_type, a.status
            FROM appointments a
            JOIN patients p ON p.patient_id = a.patient_id
            LEFT JOIN doctors d ON d.doctor_id = a.doctor_id
            WHERE a.appointment_date = $1 AND a.is_active
            ORDER BY a.appointment_time
            "#,
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::Query)
    }
}
