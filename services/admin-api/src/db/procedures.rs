//! Procedure store.

use carelane_id::{DoctorId, NurseId, PatientId, ProcedureId};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::{postgres::PgPool, postgres::PgRow, Row};
use tracing::{info, warn};

use super::numbering::{self, GENERATION_ATTEMPTS, PROCEDURE_NUMBER};
use super::DbError;

const SELECT_PROCEDURE: &str = r#"
    SELECT pr.*, p.first_name || ' ' || p.last_name AS patient_name,
           d.first_name || ' ' || d.last_name AS doctor_name
    FROM procedures pr
    JOIN patients p ON p.patient_id = pr.patient_id
    LEFT JOIN doctors d ON d.doctor_id = pr.doctor_id
"#;

/// A row from the procedures table with joined display names.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProcedureRow {
    pub procedure_id: ProcedureId,
    pub procedure_number: String,
    pub patient_id: PatientId,
    pub doctor_id: Option<DoctorId>,
    pub nurse_id: Option<NurseId>,
    pub patient_name: String,
    pub doctor_name: Option<String>,
    pub procedure_type: String,
    pub procedure_name: String,
    pub procedure_date: NaiveDate,
    pub procedure_time: Option<NaiveTime>,
    pub treatment_notes: String,
    pub status: String,
    pub cost_cents: i64,
    pub invoice_generated: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for ProcedureRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            procedure_id: ProcedureId::new(row.try_get("procedure_id")?),
            procedure_number: row.try_get("procedure_number")?,
            patient_id: PatientId::new(row.try_get("patient_id")?),
            doctor_id: row.try_get::<Option<i64>, _>("doctor_id")?.map(DoctorId::new),
            nurse_id: row.try_get::<Option<i64>, _>("nurse_id")?.map(NurseId::new),
            patient_name: row.try_get("patient_name")?,
            doctor_name: row.try_get("doctor_name")?,
            procedure_type: row.try_get("procedure_type")?,
            procedure_name: row.try_get("procedure_name")?,
            procedure_date: row.try_get("procedure_date")?,
            procedure_time: row.try_get("procedure_time")?,
            treatment_notes: row.try_get("treatment_notes")?,
            status: row.try_get("status")?,
            cost_cents: row.try_get("cost_cents")?,
            invoice_generated: row.try_get("invoice_generated")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Input for creating a procedure.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct CreateProcedure {
    /// Caller-supplied procedure number; generated when absent.
    pub procedure_number: Option<String>,
    pub patient_id: PatientId,
    pub doctor_id: Option<DoctorId>,
    pub nurse_id: Option<NurseId>,
    pub procedure_type: String,
    pub procedure_name: String,
    pub procedure_date: NaiveDate,
    pub procedure_time: Option<NaiveTime>,
    pub treatment_notes: String,
    pub status: String,
    pub cost_cents: i64,
}

/// Input for updating a procedure. The procedure number is immutable.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct UpdateProcedure {
    pub doctor_id: Option<DoctorId>,
    pub nurse_id: Option<NurseId>,
    pub procedure_type: String,
    pub procedure_name: String,
    pub procedure_date: NaiveDate,
    pub procedure_time: Option<NaiveTime>,
    pub treatment_notes: String,
    pub status: String,
    pub cost_cents: i64,
    pub invoice_generated: bool,
}

/// Store for procedure records.
#[derive(Clone)]
pub struct ProcedureStore {
    pool: PgPool,
}

impl ProcedureStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// List active procedures, optionally for one patient or one doctor,
    /// newest first.
    pub async fn list(
        &self,
        patient_id: Option<PatientId>,
        doctor_id: Option<DoctorId>,
    ) -> Result<Vec<ProcedureRow>, DbError> {
        let sql = format!(
            r#"{SELECT_PROCEDURE}
            WHERE pr.is_active
              AND ($1::bigint IS NULL OR pr.patient_id = $1)
              AND ($2::bigint IS NULL OR pr.doctor_id = $2)
            ORDER BY pr.procedure_date DESC
            "#
        );

        sqlx::query_as::<_, ProcedureRow>(&sql)
            .bind(patient_id.map(|id| id.value()))
            .bind(doctor_id.map(|id| id.value()))
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::Query)
    }

    /// Fetch a single procedure by row id.
    pub async fn get(&self, id: ProcedureId) -> Result<Option<ProcedureRow>, DbError> {
        let sql = format!("{SELECT_PROCEDURE} WHERE pr.procedure_id = $1");
        sqlx::query_as::<_, ProcedureRow>(&sql)
            .bind(id.value())
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::Query)
    }

    /// Create a procedure, generating the procedure number when absent.
    pub async fn create(&self, input: CreateProcedure) -> Result<ProcedureRow, DbError> {
        let supplied = input.procedure_number.is_some();
        let mut attempts = if supplied { 1 } else { GENERATION_ATTEMPTS };

        loop {
            let number = match &input.procedure_number {
                Some(n) => n.clone(),
                None => numbering::next_number(
                    &self.pool,
                    PROCEDURE_NUMBER,
                    numbering::current_year(),
                )
                .await?
                .to_string(),
            };

            match self.insert(&input, &number).await {
                Ok(id) => {
                    info!(procedure_id = %id, procedure_number = %number, "Procedure created");
                    return self.get(id).await?.ok_or(DbError::NotFound {
                        entity: "procedure",
                        id: id.value(),
                    });
                }
                Err(e) => {
                    attempts -= 1;
                    if !supplied
                        && attempts > 0
                        && numbering::is_number_collision(&e, PROCEDURE_NUMBER)
                    {
                        warn!(procedure_number = %number, "Procedure number collision, regenerating");
                        continue;
                    }
                    return Err(e);
                }
            }
        }
    }

    async fn insert(&self, input: &CreateProcedure, number: &str) -> Result<ProcedureId, DbError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO procedures (
                procedure_number, patient_id, doctor_id, nurse_id,
                procedure_type, procedure_name, procedure_date, procedure_time,
                treatment_notes, status, cost_cents
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING procedure_id
            "#,
        )
        .bind(number)
        .bind(input.patient_id.value())
        .bind(input.doctor_id.map(|id| id.value()))
        .bind(input.nurse_id.map(|id| id.value()))
        .bind(&input.procedure_type)
        .bind(&input.procedure_name)
        .bind(input.procedure_date)
        .bind(input.procedure_time)
        .bind(&input.treatment_notes)
        .bind(&input.status)
        .bind(input.cost_cents)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from_write)?;

        Ok(ProcedureId::new(id))
    }

    /// Update a procedure's mutable fields.
    pub async fn update(
        &self,
        id: ProcedureId,
        input: UpdateProcedure,
    ) -> Result<ProcedureRow, DbError> {
        let result = sqlx::query(
            r#"
            UPDATE procedures SET
                doctor_id = $2, nurse_id = $3, procedure_type = $4,
                procedure_name = $5, procedure_date = $6, procedure_time = $7,
                treatment_notes = $8, status = $9, cost_cents = $10,
                invoice_generated = $11, updated_at = now()
            WHERE procedure_id = $1
            "#,
        )
        .bind(id.value())
        .bind(input.doctor_id.map(|id| id.value()))
        .bind(input.nurse_id.map(|id| id.value()))
        .bind(&input.procedure_type)
        .bind(&input.procedure_name)
        .bind(input.procedure_date)
        .bind(input.procedure_time)
        .bind(&input.treatment_notes)
        .bind(&input.status)
        .bind(input.cost_cents)
        .bind(input.invoice_generated)
        .execute(&self.pool)
        .await
        .map_err(DbError::from_write)?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound {
                entity: "procedure",
                id: id.value(),
            });
        }

        self.get(id).await?.ok_or(DbError::NotFound {
            entity: "procedure",
            id: id.value(),
        })
    }

    /// Soft-delete a procedure. The procedure number is never reused.
    pub async fn delete(&self, id: ProcedureId) -> Result<(), DbError> {
        let result = sqlx::query(
            "UPDATE procedures SET is_active = FALSE, updated_at = now() WHERE procedure_id = $1",
        )
        .bind(id.value())
        .execute(&self.pool)
        .await
        .map_err(DbError::Query)?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound {
                entity: "procedure",
                id: id.value(),
            });
        }
        Ok(())
    }
}
