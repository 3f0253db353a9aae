//! Patient store.
//!
//! Patients carry the MR (medical record) number, generated at creation when
//! the caller does not supply one. Deleting a patient is a soft delete and is
//! rejected while active dependent records exist; the dependents keep a
//! non-owning reference to their patient.

use carelane_id::PatientId;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{postgres::PgPool, postgres::PgRow, Row};
use tracing::{info, warn};

use super::numbering::{self, GENERATION_ATTEMPTS, PATIENT_MR};
use super::{AppointmentRow, DbError, LabTestRow, PrescriptionRow, ProcedureRow, TransactionRow};

/// A row from the patients table.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PatientRow {
    pub patient_id: PatientId,
    pub mr_number: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub alternate_phone: String,
    pub date_of_birth: Option<NaiveDate>,
    pub age: Option<i32>,
    pub gender: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub blood_group: String,
    pub emergency_contact_name: String,
    pub emergency_contact_phone: String,
    pub medical_history: String,
    pub allergies: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PatientRow {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl<'r> sqlx::FromRow<'r, PgRow> for PatientRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            patient_id: PatientId::new(row.try_get("patient_id")?),
            mr_number: row.try_get("mr_number")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            email: row.try_get("email")?,
            phone: row.try_get("phone")?,
            alternate_phone: row.try_get("alternate_phone")?,
            date_of_birth: row.try_get("date_of_birth")?,
            age: row.try_get("age")?,
            gender: row.try_get("gender")?,
            address: row.try_get("address")?,
            city: row.try_get("city")?,
            state: row.try_get("state")?,
            zip_code: row.try_get("zip_code")?,
            blood_group: row.try_get("blood_group")?,
            emergency_contact_name: row.try_get("emergency_contact_name")?,
            emergency_contact_phone: row.try_get("emergency_contact_phone")?,
            medical_history: row.try_get("medical_history")?,
            allergies: row.try_get("allergies")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// A patient with all related records eagerly loaded.
#[derive(Debug, serde::Serialize)]
pub struct PatientDetail {
    pub patient: PatientRow,
    pub appointments: Vec<AppointmentRow>,
    pub procedures: Vec<ProcedureRow>,
    pub lab_tests: Vec<LabTestRow>,
    pub prescriptions: Vec<PrescriptionRow>,
    pub transactions: Vec<TransactionRow>,
}

/// Input for creating a patient.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct CreatePatient {
    /// Caller-supplied MR number; generated when absent.
    pub mr_number: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub alternate_phone: String,
    pub date_of_birth: Option<NaiveDate>,
    pub age: Option<i32>,
    pub gender: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub blood_group: String,
    pub emergency_contact_name: String,
    pub emergency_contact_phone: String,
    pub medical_history: String,
    pub allergies: String,
}

/// Input for updating a patient. The MR number is immutable.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct UpdatePatient {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub alternate_phone: String,
    pub date_of_birth: Option<NaiveDate>,
    pub age: Option<i32>,
    pub gender: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub blood_group: String,
    pub emergency_contact_name: String,
    pub emergency_contact_phone: String,
    pub medical_history: String,
    pub allergies: String,
}

/// Store for patient records.
#[derive(Clone)]
pub struct PatientStore {
    pool: PgPool,
}

impl PatientStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// List all active patients, newest first.
    pub async fn list(&self) -> Result<Vec<PatientRow>, DbError> {
        sqlx::query_as::<_, PatientRow>(
            r#"
            SELECT * FROM patients
            WHERE is_active
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::Query)
    }

    /// Fetch a single patient by row id.
    pub async fn get(&self, id: PatientId) -> Result<Option<PatientRow>, DbError> {
        sqlx::query_as::<_, PatientRow>("SELECT * FROM patients WHERE patient_id = $1")
            .bind(id.value())
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::Query)
    }

    /// Fetch a patient by MR number.
    pub async fn find_by_mr_number(&self, mr_number: &str) -> Result<Option<PatientRow>, DbError> {
        sqlx::query_as::<_, PatientRow>("SELECT * FROM patients WHERE mr_number = $1")
            .bind(mr_number)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::Query)
    }

    /// Fetch a patient with all related records (the eager-loaded detail
    /// view).
    pub async fn detail(&self, id: PatientId) -> Result<Option<PatientDetail>, DbError> {
        let Some(patient) = self.get(id).await? else {
            return Ok(None);
        };

        let appointments = sqlx::query_as::<_, AppointmentRow>(
            r#"
            SELECT a.*, p.first_name || ' ' || p.last_name AS patient_name,
                   d.first_name || ' ' || d.last_name AS doctor_name,
                   n.first_name || ' ' || n.last_name AS nurse_name
            FROM appointments a
            JOIN patients p ON p.patient_id = a.patient_id
            LEFT JOIN doctors d ON d.doctor_id = a.doctor_id
            LEFT JOIN nurses n ON n.nurse_id = a.nurse_id
            WHERE a.patient_id = $1 AND a.is_active
            ORDER BY a.appointment_date DESC
            "#,
        )
        .bind(id.value())
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::Query)?;

        let procedures = sqlx::query_as::<_, ProcedureRow>(
            r#"
            SELECT pr.*, p.first_name || ' ' || p.last_name AS patient_name,
                   d.first_name || ' ' || d.last_name AS doctor_name
            FROM procedures pr
            JOIN patients p ON p.patient_id = pr.patient_id
            LEFT JOIN doctors d ON d.doctor_id = pr.doctor_id
            WHERE pr.patient_id = $1 AND pr.is_active
            ORDER BY pr.procedure_date DESC
            "#,
        )
        .bind(id.value())
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::Query)?;

        let lab_tests = sqlx::query_as::<_, LabTestRow>(
            r#"
            SELECT l.*, p.first_name || ' ' || p.last_name AS patient_name,
                   c.name AS category_name,
                   s.first_name || ' ' || s.last_name AS assigned_staff_name
            FROM lab_tests l
            JOIN patients p ON p.patient_id = l.patient_id
            JOIN lab_test_categories c ON c.category_id = l.category_id
            LEFT JOIN lab_staff s ON s.lab_staff_id = l.assigned_staff_id
            WHERE l.patient_id = $1 AND l.is_active
            ORDER BY l.test_date DESC
            "#,
        )
        .bind(id.value())
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::Query)?;

        let prescriptions = sqlx::query_as::<_, PrescriptionRow>(
            r#"
            SELECT rx.*, p.first_name || ' ' || p.last_name AS patient_name,
                   d.first_name || ' ' || d.last_name AS doctor_name
            FROM prescriptions rx
            JOIN patients p ON p.patient_id = rx.patient_id
            LEFT JOIN doctors d ON d.doctor_id = rx.doctor_id
            WHERE rx.patient_id = $1 AND rx.is_active
            ORDER BY rx.prescription_date DESC
            "#,
        )
        .bind(id.value())
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::Query)?;

        let transactions = sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT t.*, p.first_name || ' ' || p.last_name AS patient_name
            FROM transactions t
            JOIN patients p ON p.patient_id = t.patient_id
            WHERE t.patient_id = $1 AND t.is_active
            ORDER BY t.transaction_date DESC
            "#,
        )
        .bind(id.value())
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::Query)?;

        Ok(Some(PatientDetail {
            patient,
            appointments,
            procedures,
            lab_tests,
            prescriptions,
            transactions,
        }))
    }

    /// Create a patient, generating the MR number when absent.
    ///
    /// Generation is read-then-write with no lock; the unique index on
    /// mr_number is the safety net. On a collision with an auto-generated
    /// number, generation is retried a bounded number of times. A
    /// caller-supplied number is never retried.
    pub async fn create(&self, input: CreatePatient) -> Result<PatientRow, DbError> {
        let supplied = input.mr_number.is_some();
        let mut attempts = if supplied { 1 } else { GENERATION_ATTEMPTS };

        loop {
            let mr_number = match &input.mr_number {
                Some(n) => n.clone(),
                None => {
                    numbering::next_number(&self.pool, PATIENT_MR, numbering::current_year())
                        .await?
                        .to_string()
                }
            };

            match self.insert(&input, &mr_number).await {
                Ok(row) => {
                    info!(patient_id = %row.patient_id, mr_number = %row.mr_number, "Patient created");
                    return Ok(row);
                }
                Err(e) => {
                    attempts -= 1;
                    if !supplied && attempts > 0 && numbering::is_number_collision(&e, PATIENT_MR)
                    {
                        warn!(mr_number = %mr_number, "MR number collision, regenerating");
                        continue;
                    }
                    return Err(e);
                }
            }
        }
    }

    async fn insert(&self, input: &CreatePatient, mr_number: &str) -> Result<PatientRow, DbError> {
        sqlx::query_as::<_, PatientRow>(
            r#"
            INSERT INTO patients (
                mr_number, first_name, last_name, email, phone, alternate_phone,
                date_of_birth, age, gender, address, city, state, zip_code,
                blood_group, emergency_contact_name, emergency_contact_phone,
                medical_history, allergies
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                    $14, $15, $16, $17, $18)
            RETURNING *
            "#,
        )
        .bind(mr_number)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.alternate_phone)
        .bind(input.date_of_birth)
        .bind(input.age)
        .bind(&input.gender)
        .bind(&input.address)
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.zip_code)
        .bind(&input.blood_group)
        .bind(&input.emergency_contact_name)
        .bind(&input.emergency_contact_phone)
        .bind(&input.medical_history)
        .bind(&input.allergies)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from_write)
    }

    /// Update a patient's mutable fields. The MR number never changes.
    pub async fn update(&self, id: PatientId, input: UpdatePatient) -> Result<PatientRow, DbError> {
        sqlx::query_as::<_, PatientRow>(
            r#"
            UPDATE patients SET
                first_name = $2, last_name = $3, email = $4, phone = $5,
                alternate_phone = $6, date_of_birth = $7, age = $8, gender = $9,
                address = $10, city = $11, state = $12, zip_code = $13,
                blood_group = $14, emergency_contact_name = $15,
                emergency_contact_phone = $16, medical_history = $17,
                allergies = $18, updated_at = now()
            WHERE patient_id = $1
            RETURNING *
            "#,
        )
        .bind(id.value())
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.alternate_phone)
        .bind(input.date_of_birth)
        .bind(input.age)
        .bind(&input.gender)
        .bind(&input.address)
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.zip_code)
        .bind(&input.blood_group)
        .bind(&input.emergency_contact_name)
        .bind(&input.emergency_contact_phone)
        .bind(&input.medical_history)
        .bind(&input.allergies)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from_write)?
        .ok_or(DbError::NotFound {
            entity: "patient",
            id: id.value(),
        })
    }

    /// Soft-delete a patient.
    ///
    /// Rejected while active dependent records exist, mirroring RESTRICT
    /// semantics in the application-level delete path. The MR number is
    /// never reused.
    pub async fn delete(&self, id: PatientId) -> Result<(), DbError> {
        let dependents: i64 = sqlx::query_scalar(
            r#"
            SELECT (SELECT count(*) FROM appointments WHERE patient_id = $1 AND is_active)
                 + (SELECT count(*) FROM procedures WHERE patient_id = $1 AND is_active)
                 + (SELECT count(*) FROM lab_tests WHERE patient_id = $1 AND is_active)
                 + (SELECT count(*) FROM prescriptions WHERE patient_id = $1 AND is_active)
                 + (SELECT count(*) FROM transactions WHERE patient_id = $1 AND is_active)
            "#,
        )
        .bind(id.value())
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::Query)?;

        if dependents > 0 {
            return Err(DbError::RestrictedDelete {
                entity: "patient",
                id: id.value(),
                dependents: "clinical or billing records",
            });
        }

        let result = sqlx::query(
            "UPDATE patients SET is_active = FALSE, updated_at = now() WHERE patient_id = $1",
        )
        .bind(id.value())
        .execute(&self.pool)
        .await
        .map_err(DbError::Query)?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound {
                entity: "patient",
                id: id.value(),
            });
        }
        Ok(())
    }
}
