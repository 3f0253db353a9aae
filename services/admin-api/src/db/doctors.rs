//! Doctor store, including weekly schedules.
//!
//! Doctors are not numbered; their weekly schedule rows are replaced as a
//! set, which is how the original edit screen saved them.

use carelane_id::{DoctorId, DoctorScheduleId};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::{postgres::PgPool, postgres::PgRow, Row};

use super::DbError;

/// Per-doctor activity totals.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DoctorStatistics {
    pub doctor_id: DoctorId,
    /// Active appointments assigned to this doctor.
    pub appointment_count: i64,
    /// Paid transaction totals attributed through the doctor's appointments
    /// and procedures, in cents.
    pub total_revenue_cents: i64,
}

/// A row from the doctors table.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DoctorRow {
    pub doctor_id: DoctorId,
    pub first_name: String,
    pub last_name: String,
    pub specialization: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub qualification: String,
    pub license_number: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: String,
    pub consultation_fee_cents: i64,
    pub status: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DoctorRow {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl<'r> sqlx::FromRow<'r, PgRow> for DoctorRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            doctor_id: DoctorId::new(row.try_get("doctor_id")?),
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            specialization: row.try_get("specialization")?,
            email: row.try_get("email")?,
            phone: row.try_get("phone")?,
            address: row.try_get("address")?,
            qualification: row.try_get("qualification")?,
            license_number: row.try_get("license_number")?,
            date_of_birth: row.try_get("date_of_birth")?,
            gender: row.try_get("gender")?,
            consultation_fee_cents: row.try_get("consultation_fee_cents")?,
            status: row.try_get("status")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// A row from the doctor_schedules table.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DoctorScheduleRow {
    pub schedule_id: DoctorScheduleId,
    pub doctor_id: DoctorId,
    pub day_of_week: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_available: bool,
}

impl<'r> sqlx::FromRow<'r, PgRow> for DoctorScheduleRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            schedule_id: DoctorScheduleId::new(row.try_get("schedule_id")?),
            doctor_id: DoctorId::new(row.try_get("doctor_id")?),
            day_of_week: row.try_get("day_of_week")?,
            start_time: row.try_get("start_time")?,
            end_time: row.try_get("end_time")?,
            is_available: row.try_get("is_available")?,
        })
    }
}

/// One schedule slot in a replace-schedules request.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct DoctorScheduleEntry {
    /// 0 = Sunday through 6 = Saturday.
    pub day_of_week: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[serde(default = "default_true")]
    pub is_available: bool,
}

fn default_true() -> bool {
    true
}

/// Input for creating a doctor.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct CreateDoctor {
    pub first_name: String,
    pub last_name: String,
    pub specialization: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub qualification: String,
    pub license_number: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: String,
    pub consultation_fee_cents: i64,
    pub status: String,
}

/// Input for updating a doctor.
pub type UpdateDoctor = CreateDoctor;

/// Store for doctor records and schedules.
#[derive(Clone)]
pub struct DoctorStore {
    pool: PgPool,
}

impl DoctorStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// List active doctors, optionally restricted to one specialization.
    pub async fn list(&self, specialization: Option<&str>) -> Result<Vec<DoctorRow>, DbError> {
        sqlx::query_as::<_, DoctorRow>(
            r#"
            SELECT * FROM doctors
            WHERE is_active AND ($1::text IS NULL OR specialization = $1)
            ORDER BY last_name, first_name
            "#,
        )
        .bind(specialization)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::Query)
    }

    /// Fetch a single doctor by row id.
    pub async fn get(&self, id: DoctorId) -> Result<Option<DoctorRow>, DbError> {
        sqlx::query_as::<_, DoctorRow>("SELECT * FROM doctors WHERE doctor_id = $1")
            .bind(id.value())
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::Query)
    }

    /// Create a doctor.
    pub async fn create(&self, input: CreateDoctor) -> Result<DoctorRow, DbError> {
        sqlx::query_as::<_, DoctorRow>(
            r#"
            INSERT INTO doctors (
                first_name, last_name, specialization, email, phone, address,
                qualification, license_number, date_of_birth, gender,
                consultation_fee_cents, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.specialization)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.address)
        .bind(&input.qualification)
        .bind(&input.license_number)
        .bind(input.date_of_birth)
        .bind(&input.gender)
        .bind(input.consultation_fee_cents)
        .bind(&input.status)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from_write)
    }

    /// Update a doctor.
    pub async fn update(&self, id: DoctorId, input: UpdateDoctor) -> Result<DoctorRow, DbError> {
        sqlx::query_as::<_, DoctorRow>(
            r#"
            UPDATE doctors SET
                first_name = $2, last_name = $3, specialization = $4,
                email = $5, phone = $6, address = $7, qualification = $8,
                license_number = $9, date_of_birth = $10, gender = $11,
                consultation_fee_cents = $12, status = $13, updated_at = now()
            WHERE doctor_id = $1
            RETURNING *
            "#,
        )
        .bind(id.value())
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.specialization)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.address)
        .bind(&input.qualification)
        .bind(&input.license_number)
        .bind(input.date_of_birth)
        .bind(&input.gender)
        .bind(input.consultation_fee_cents)
        .bind(&input.status)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from_write)?
        .ok_or(DbError::NotFound {
            entity: "doctor",
            id: id.value(),
        })
    }

    /// Soft-delete a doctor. Appointments and procedures keep their rows;
    /// the schema clears the doctor reference only on a hard delete, so
    /// historical records still name the doctor.
    pub async fn delete(&self, id: DoctorId) -> Result<(), DbError> {
        let result = sqlx::query(
            "UPDATE doctors SET is_active = FALSE, updated_at = now() WHERE doctor_id = $1",
        )
        .bind(id.value())
        .execute(&self.pool)
        .await
        .map_err(DbError::Query)?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound {
                entity: "doctor",
                id: id.value(),
            });
        }
        Ok(())
    }

    /// Appointment count and paid revenue for one doctor.
    ///
    /// Revenue is attributed through the transaction's appointment or
    /// procedure link; a transaction tied to both counts once per link, which
    /// is how the original reports added it up.
    pub async fn statistics(&self, id: DoctorId) -> Result<DoctorStatistics, DbError> {
        if self.get(id).await?.is_none() {
            return Err(DbError::NotFound {
                entity: "doctor",
                id: id.value(),
            });
        }

        let row = sqlx::query(
            r#"
            SELECT
                (SELECT count(*) FROM appointments
                    WHERE doctor_id = $1 AND is_active) AS appointment_count,
                (SELECT COALESCE(sum(t.total_cents), 0) FROM transactions t
                    JOIN appointments a ON a.appointment_id = t.appointment_id
                    WHERE a.doctor_id = $1 AND t.is_active AND t.status = 'paid')
              + (SELECT COALESCE(sum(t.total_cents), 0) FROM transactions t
                    JOIN procedures pr ON pr.procedure_id = t.procedure_id
                    WHERE pr.doctor_id = $1 AND t.is_active AND t.status = 'paid')
                    AS total_revenue_cents
            "#,
        )
        .bind(id.value())
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::Query)?;

        Ok(DoctorStatistics {
            doctor_id: id,
            appointment_count: row.try_get("appointment_count").map_err(DbError::Query)?,
            total_revenue_cents: row.try_get("total_revenue_cents").map_err(DbError::Query)?,
        })
    }

    /// List a doctor's schedule slots, ordered by day and start time.
    pub async fn schedules(&self, id: DoctorId) -> Result<Vec<DoctorScheduleRow>, DbError> {
        sqlx::query_as::<_, DoctorScheduleRow>(
            r#"
            SELECT * FROM doctor_schedules
            WHERE doctor_id = $1
            ORDER BY day_of_week, start_time
            "#,
        )
        .bind(id.value())
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::Query)
    }

    /// Replace a doctor's weekly schedule as a set, in one transaction.
    pub async fn replace_schedules(
        &self,
        id: DoctorId,
        entries: Vec<DoctorScheduleEntry>,
    ) -> Result<Vec<DoctorScheduleRow>, DbError> {
        if self.get(id).await?.is_none() {
            return Err(DbError::NotFound {
                entity: "doctor",
                id: id.value(),
            });
        }

        let mut tx = self.pool.begin().await.map_err(DbError::Query)?;

        sqlx::query("DELETE FROM doctor_schedules WHERE doctor_id = $1")
            .bind(id.value())
            .execute(&mut *tx)
            .await
            .map_err(DbError::Query)?;

        for entry in &entries {
            sqlx::query(
                r#"
                INSERT INTO doctor_schedules
                    (doctor_id, day_of_week, start_time, end_time, is_available)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(id.value())
            .bind(entry.day_of_week)
            .bind(entry.start_time)
            .bind(entry.end_time)
            .bind(entry.is_available)
            .execute(&mut *tx)
            .await
            .map_err(DbError::from_write)?;
        }

        tx.commit().await.map_err(DbError::Query)?;

        self.schedules(id).await
    }
}
