//! Prescription store.
//!
//! Prescriptions carry the RX number series and reference their patient plus
//! an optional procedure and prescribing doctor.

use carelane_id::{DoctorId, PatientId, PrescriptionId, ProcedureId};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{postgres::PgPool, postgres::PgRow, Row};
use tracing::{info, warn};

use super::numbering::{self, GENERATION_ATTEMPTS, PRESCRIPTION_NUMBER};
use super::DbError;

const SELECT_PRESCRIPTION: &str = r#"
    SELECT rx.*, p.first_name || ' ' || p.last_name AS patient_name,
           d.first_name || ' ' || d.last_name AS doctor_name
    FROM prescriptions rx
    JOIN patients p ON p.patient_id = rx.patient_id
    LEFT JOIN doctors d ON d.doctor_id = rx.doctor_id
"#;

/// A row from the prescriptions table with joined display names.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PrescriptionRow {
    pub prescription_id: PrescriptionId,
    pub prescription_number: String,
    pub patient_id: PatientId,
    pub procedure_id: Option<ProcedureId>,
    pub doctor_id: Option<DoctorId>,
    pub patient_name: String,
    pub doctor_name: Option<String>,
    pub prescription_date: NaiveDate,
    pub medications: String,
    pub instructions: String,
    pub notes: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for PrescriptionRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            prescription_id: PrescriptionId::new(row.try_get("prescription_id")?),
            prescription_number: row.try_get("prescription_number")?,
            patient_id: PatientId::new(row.try_get("patient_id")?),
            procedure_id: row
                .try_get::<Option<i64>, _>("procedure_id")?
                .map(ProcedureId::new),
            doctor_id: row.try_get::<Option<i64>, _>("doctor_id")?.map(DoctorId::new),
            patient_name: row.try_get("patient_name")?,
            doctor_name: row.try_get("doctor_name")?,
            prescription_date: row.try_get("prescription_date")?,
            medications: row.try_get("medications")?,
            instructions: row.try_get("instructions")?,
            notes: row.try_get("notes")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Input for creating a prescription.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct CreatePrescription {
    /// Caller-supplied prescription number; generated when absent.
    pub prescription_number: Option<String>,
    pub patient_id: PatientId,
    pub procedure_id: Option<ProcedureId>,
    pub doctor_id: Option<DoctorId>,
    pub prescription_date: NaiveDate,
    pub medications: String,
    pub instructions: String,
    pub notes: String,
}

/// Input for updating a prescription. The prescription number is immutable.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct UpdatePrescription {
    pub procedure_id: Option<ProcedureId>,
    pub doctor_id: Option<DoctorId>,
    pub prescription_date: NaiveDate,
    pub medications: String,
    pub instructions: String,
    pub notes: String,
}

/// Store for prescription records.
#[derive(Clone)]
pub struct PrescriptionStore {
    pool: PgPool,
}

impl PrescriptionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// List active prescriptions with optional patient / procedure filters,
    /// newest first.
    pub async fn list(
        &self,
        patient_id: Option<PatientId>,
        procedure_id: Option<ProcedureId>,
    ) -> Result<Vec<PrescriptionRow>, DbError> {
        let sql = format!(
            r#"{SELECT_PRESCRIPTION}
            WHERE rx.is_active
              AND ($1::bigint IS NULL OR rx.patient_id = $1)
              AND ($2::bigint IS NULL OR rx.procedure_id = $2)
            ORDER BY rx.prescription_date DESC
            "#
        );

        sqlx::query_as::<_, PrescriptionRow>(&sql)
            .bind(patient_id.map(|id| id.value()))
            .bind(procedure_id.map(|id| id.value()))
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::Query)
    }

    /// Fetch a single prescription by row id.
    pub async fn get(&self, id: PrescriptionId) -> Result<Option<PrescriptionRow>, DbError> {
        let sql = format!("{SELECT_PRESCRIPTION} WHERE rx.prescription_id = $1");
        sqlx::query_as::<_, PrescriptionRow>(&sql)
            .bind(id.value())
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::Query)
    }

    /// Create a prescription, generating the RX number when absent.
    pub async fn create(&self, input: CreatePrescription) -> Result<PrescriptionRow, DbError> {
        let supplied = input.prescription_number.is_some();
        let mut attempts = if supplied { 1 } else { GENERATION_ATTEMPTS };

        loop {
            let number = match &input.prescription_number {
                Some(n) => n.clone(),
                None => numbering::next_number(
                    &self.pool,
                    PRESCRIPTION_NUMBER,
                    numbering::current_year(),
                )
                .await?
                .to_string(),
            };

            match self.insert(&input, &number).await {
                Ok(id) => {
                    info!(prescription_id = %id, prescription_number = %number, "Prescription created");
                    return self.get(id).await?.ok_or(DbError::NotFound {
                        entity: "prescription",
                        id: id.value(),
                    });
                }
                Err(e) => {
                    attempts -= 1;
                    if !supplied
                        && attempts > 0
                        && numbering::is_number_collision(&e, PRESCRIPTION_NUMBER)
                    {
                        warn!(prescription_number = %number, "Prescription number collision, regenerating");
                        continue;
                    }
                    return Err(e);
                }
            }
        }
    }

    async fn insert(
        &self,
        input: &CreatePrescription,
        number: &str,
    ) -> Result<PrescriptionId, DbError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO prescriptions (
                prescription_number, patient_id, procedure_id, doctor_id,
                prescription_date, medications, instructions, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING prescription_id
            "#,
        )
        .bind(number)
        .bind(input.patient_id.value())
        .bind(input.procedure_id.map(|id| id.value()))
        .bind(input.doctor_id.map(|id| id.value()))
        .bind(input.prescription_date)
        .bind(&input.medications)
        .bind(&input.instructions)
        .bind(&input.notes)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from_write)?;

        Ok(PrescriptionId::new(id))
    }

    /// Update a prescription's mutable fields.
    pub async fn update(
        &self,
        id: PrescriptionId,
        input: UpdatePrescription,
    ) -> Result<PrescriptionRow, DbError> {
        let result = sqlx::query(
            r#"
            UPDATE prescriptions SET
                procedure_id = $2, doctor_id = $3, prescription_date = $4,
                medications = $5, instructions = $6, notes = $7,
                updated_at = now()
            WHERE prescription_id = $1
            "#,
        )
        .bind(id.value())
        .bind(input.procedure_id.map(|id| id.value()))
        .bind(input.doctor_id.map(|id| id.value()))
        .bind(input.prescription_date)
        .bind(&input.medications)
        .bind(&input.instructions)
        .bind(&input.notes)
        .execute(&self.pool)
        .await
        .map_err(DbError::from_write)?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound {
                entity: "prescription",
                id: id.value(),
            });
        }

        self.get(id).await?.ok_or(DbError::NotFound {
            entity: "prescription",
            id: id.value(),
        })
    }

    /// Soft-delete a prescription. The RX number is never reused.
    pub async fn delete(&self, id: PrescriptionId) -> Result<(), DbError> {
        let result = sqlx::query(
            "UPDATE prescriptions SET is_active = FALSE, updated_at = now() WHERE prescription_id = $1",
        )
        .bind(id.value())
        .execute(&self.pool)
        .await
        .map_err(DbError::Query)?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound {
                entity: "prescription",
                id: id.value(),
            });
        }
        Ok(())
    }
}
