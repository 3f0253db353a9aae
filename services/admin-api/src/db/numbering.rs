//! Record number issuance against the database.
//!
//! Each numbered entity family stores its number in a dedicated column with a
//! unique index. Issuing the next number is one read (lexically greatest
//! number in the current year's series) followed by one write (the insert in
//! the owning store). No lock is held between the two, so concurrent requests
//! for the same series can compute the same sequence; the unique index is the
//! sole safety net and the insert surfaces the collision as
//! [`DbError::UniqueViolation`](super::DbError::UniqueViolation).

use carelane_id::{NumberKind, RecordNumber};
use chrono::{Datelike, Utc};
use sqlx::postgres::PgPool;
use tracing::debug;

use super::DbError;

/// A (table, column) pair holding one number series.
#[derive(Debug, Clone, Copy)]
pub struct NumberSeries {
    pub kind: NumberKind,
    pub table: &'static str,
    pub column: &'static str,
}

pub const PATIENT_MR: NumberSeries = NumberSeries {
    kind: NumberKind::MedicalRecord,
    table: "patients",
    column: "mr_number",
};

pub const APPOINTMENT_NUMBER: NumberSeries = NumberSeries {
    kind: NumberKind::Appointment,
    table: "appointments",
    column: "appointment_number",
};

pub const PROCEDURE_NUMBER: NumberSeries = NumberSeries {
    kind: NumberKind::Procedure,
    table: "procedures",
    column: "procedure_number",
};

pub const LAB_TEST_NUMBER: NumberSeries = NumberSeries {
    kind: NumberKind::LabTest,
    table: "lab_tests",
    column: "test_number",
};

pub const TRANSACTION_NUMBER: NumberSeries = NumberSeries {
    kind: NumberKind::Transaction,
    table: "transactions",
    column: "transaction_number",
};

pub const INVOICE_NUMBER: NumberSeries = NumberSeries {
    kind: NumberKind::Invoice,
    table: "transactions",
    column: "invoice_number",
};

pub const PRESCRIPTION_NUMBER: NumberSeries = NumberSeries {
    kind: NumberKind::Prescription,
    table: "prescriptions",
    column: "prescription_number",
};

/// How many times a create path retries generation after a number collision.
pub const GENERATION_ATTEMPTS: u32 = 3;

/// The current issue year.
pub fn current_year() -> u16 {
    // Year fits u16 for any date this system will see.
    Utc::now().year() as u16
}

/// Issues the next number in a series for the given year.
///
/// The lookup filters on the year's series prefix and takes the lexically
/// greatest match, so a new year naturally restarts the sequence at 1. A
/// malformed stored number is treated as absent.
pub async fn next_number(
    pool: &PgPool,
    series: NumberSeries,
    year: u16,
) -> Result<RecordNumber, DbError> {
    let latest = latest_in_series(pool, series, year).await?;
    let number = RecordNumber::following(series.kind, year, latest.as_deref());

    debug!(
        series = %series.kind,
        year,
        latest = latest.as_deref().unwrap_or("<none>"),
        number = %number,
        "Issued record number"
    );

    Ok(number)
}

/// Returns the most recently issued number in a (series, year), if any.
async fn latest_in_series(
    pool: &PgPool,
    series: NumberSeries,
    year: u16,
) -> Result<Option<String>, DbError> {
    // Table and column names come from the static series constants above,
    // never from user input.
    let sql = format!(
        "SELECT {col} FROM {table} WHERE {col} LIKE $1 ORDER BY {col} DESC LIMIT 1",
        col = series.column,
        table = series.table,
    );

    let pattern = format!("{}%", series.kind.series_prefix(year));

    sqlx::query_scalar::<_, String>(&sql)
        .bind(&pattern)
        .fetch_optional(pool)
        .await
        .map_err(DbError::Query)
}

/// True if a unique violation occurred on this series' number column, meaning
/// the caller lost the generation race and may retry.
pub fn is_number_collision(err: &DbError, series: NumberSeries) -> bool {
    err.unique_constraint()
        .is_some_and(|c| c.contains(series.column))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn series_cover_all_number_kinds() {
        let series = [
            PATIENT_MR,
            APPOINTMENT_NUMBER,
            PROCEDURE_NUMBER,
            LAB_TEST_NUMBER,
            TRANSACTION_NUMBER,
            INVOICE_NUMBER,
            PRESCRIPTION_NUMBER,
        ];
        let kinds: std::collections::HashSet<_> = series.iter().map(|s| s.kind).collect();
        assert_eq!(kinds.len(), NumberKind::ALL.len());
    }

    #[test]
    fn collision_detection_matches_column() {
        let err = DbError::UniqueViolation {
            constraint: "patients_mr_number_key".to_string(),
        };
        assert!(is_number_collision(&err, PATIENT_MR));
        assert!(!is_number_collision(&err, APPOINTMENT_NUMBER));

        let other = DbError::UniqueViolation {
            constraint: "staff_accounts_email_key".to_string(),
        };
        assert!(!is_number_collision(&other, PATIENT_MR));
    }
}
