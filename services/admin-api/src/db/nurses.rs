//! Nurse store.

use carelane_id::NurseId;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPool, postgres::PgRow, Row};

use super::DbError;

/// A row from the nurses table.
#[derive(Debug, Clone, serde::Serialize)]
pub struct NurseRow {
    pub nurse_id: NurseId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub license_number: String,
    pub department: String,
    pub status: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for NurseRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            nurse_id: NurseId::new(row.try_get("nurse_id")?),
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            email: row.try_get("email")?,
            phone: row.try_get("phone")?,
            license_number: row.try_get("license_number")?,
            department: row.try_get("department")?,
            status: row.try_get("status")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Input for creating a nurse.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct CreateNurse {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub license_number: String,
    pub department: String,
    pub status: String,
}

/// Input for updating a nurse.
pub type UpdateNurse = CreateNurse;

/// Store for nurse records.
#[derive(Clone)]
pub struct NurseStore {
    pool: PgPool,
}

impl NurseStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// List active nurses.
    pub async fn list(&self) -> Result<Vec<NurseRow>, DbError> {
        sqlx::query_as::<_, NurseRow>(
            "SELECT * FROM nurses WHERE is_active ORDER BY last_name, first_name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::Query)
    }

    /// Fetch a single nurse by row id.
    pub async fn get(&self, id: NurseId) -> Result<Option<NurseRow>, DbError> {
        sqlx::query_as::<_, NurseRow>("SELECT * FROM nurses WHERE nurse_id = $1")
            .bind(id.value())
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::Query)
    }

    /// Create a nurse.
    pub async fn create(&self, input: CreateNurse) -> Result<NurseRow, DbError> {
        sqlx::query_as::<_, NurseRow>(
            r#"
            INSERT INTO nurses (
                first_name, last_name, email, phone, license_number,
                department, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.license_number)
        .bind(&input.department)
        .bind(&input.status)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from_write)
    }

    /// Update a nurse.
    pub async fn update(&self, id: NurseId, input: UpdateNurse) -> Result<NurseRow, DbError> {
        sqlx::query_as::<_, NurseRow>(
            r#"
            UPDATE nurses SET
                first_name = $2, last_name = $3, email = $4, phone = $5,
                license_number = $6, department = $7, status = $8,
                updated_at = now()
            WHERE nurse_id = $1
            RETURNING *
            "#,
        )
        .bind(id.value())
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.license_number)
        .bind(&input.department)
        .bind(&input.status)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from_write)?
        .ok_or(DbError::NotFound {
            entity: "nurse",
            id: id.value(),
        })
    }

    /// Soft-delete a nurse.
    pub async fn delete(&self, id: NurseId) -> Result<(), DbError> {
        let result = sqlx::query(
            "UPDATE nurses SET is_active = FALSE, updated_at = now() WHERE nurse_id = $1",
        )
        .bind(id.value())
        .execute(&self.pool)
        .await
        .map_err(DbError::Query)?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound {
                entity: "nurse",
                id: id.value(),
            });
        }
        Ok(())
    }
}
