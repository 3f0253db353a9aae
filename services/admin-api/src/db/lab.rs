//! Lab store: tests, categories, and lab staff.
//!
//! Lab tests carry the LAB number series. Categories and staff are plain
//! reference data; tests reference both.

use carelane_id::{LabStaffId, LabTestCategoryId, LabTestId, PatientId, ProcedureId};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{postgres::PgPool, postgres::PgRow, Row};
use tracing::{info, warn};

use super::numbering::{self, GENERATION_ATTEMPTS, LAB_TEST_NUMBER};
use super::DbError;

const SELECT_LAB_TEST: &str = r#"
    SELECT l.*, p.first_name || ' ' || p.last_name AS patient_name,
           c.name AS category_name,
           s.first_name || ' ' || s.last_name AS assigned_staff_name
    FROM lab_tests l
    JOIN patients p ON p.patient_id = l.patient_id
    JOIN lab_test_categories c ON c.category_id = l.category_id
    LEFT JOIN lab_staff s ON s.lab_staff_id = l.assigned_staff_id
"#;

/// A row from the lab_tests table with joined display names.
#[derive(Debug, Clone, serde::Serialize)]
pub struct LabTestRow {
    pub lab_test_id: LabTestId,
    pub test_number: String,
    pub patient_id: PatientId,
    pub procedure_id: Option<ProcedureId>,
    pub category_id: LabTestCategoryId,
    pub assigned_staff_id: Option<LabStaffId>,
    pub patient_name: String,
    pub category_name: String,
    pub assigned_staff_name: Option<String>,
    pub test_name: String,
    pub test_date: NaiveDate,
    pub sample_collection_date: Option<NaiveDate>,
    pub report_date: Option<NaiveDate>,
    pub status: String,
    pub report_file_path: String,
    pub report_text: String,
    pub notes: String,
    pub cost_cents: i64,
    pub invoice_generated: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for LabTestRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            lab_test_id: LabTestId::new(row.try_get("lab_test_id")?),
            test_number: row.try_get("test_number")?,
            patient_id: PatientId::new(row.try_get("patient_id")?),
            procedure_id: row
                .try_get::<Option<i64>, _>("procedure_id")?
                .map(ProcedureId::new),
            category_id: LabTestCategoryId::new(row.try_get("category_id")?),
            assigned_staff_id: row
                .try_get::<Option<i64>, _>("assigned_staff_id")?
                .map(LabStaffId::new),
            patient_name: row.try_get("patient_name")?,
            category_name: row.try_get("category_name")?,
            assigned_staff_name: row.try_get("assigned_staff_name")?,
            test_name: row.try_get("test_name")?,
            test_date: row.try_get("test_date")?,
            sample_collection_date: row.try_get("sample_collection_date")?,
            report_date: row.try_get("report_date")?,
            status: row.try_get("status")?,
            report_file_path: row.try_get("report_file_path")?,
            report_text: row.try_get("report_text")?,
            notes: row.try_get("notes")?,
            cost_cents: row.try_get("cost_cents")?,
            invoice_generated: row.try_get("invoice_generated")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// A row from the lab_test_categories table.
#[derive(Debug, Clone, serde::Serialize)]
pub struct LabTestCategoryRow {
    pub category_id: LabTestCategoryId,
    pub name: String,
    pub description: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for LabTestCategoryRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            category_id: LabTestCategoryId::new(row.try_get("category_id")?),
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// A row from the lab_staff table.
#[derive(Debug, Clone, serde::Serialize)]
pub struct LabStaffRow {
    pub lab_staff_id: LabStaffId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub department: String,
    pub status: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for LabStaffRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            lab_staff_id: LabStaffId::new(row.try_get("lab_staff_id")?),
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            email: row.try_get("email")?,
            phone: row.try_get("phone")?,
            department: row.try_get("department")?,
            status: row.try_get("status")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Input for creating a lab test.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct CreateLabTest {
    /// Caller-supplied test number; generated when absent.
    pub test_number: Option<String>,
    pub patient_id: PatientId,
    pub procedure_id: Option<ProcedureId>,
    pub category_id: LabTestCategoryId,
    pub assigned_staff_id: Option<LabStaffId>,
    pub test_name: String,
    pub test_date: NaiveDate,
    pub sample_collection_date: Option<NaiveDate>,
    pub status: String,
    pub notes: String,
    pub cost_cents: i64,
}

/// Input for updating a lab test. The test number is immutable.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct UpdateLabTest {
    pub procedure_id: Option<ProcedureId>,
    pub category_id: LabTestCategoryId,
    pub assigned_staff_id: Option<LabStaffId>,
    pub test_name: String,
    pub test_date: NaiveDate,
    pub sample_collection_date: Option<NaiveDate>,
    pub report_date: Option<NaiveDate>,
    pub status: String,
    pub report_file_path: String,
    pub report_text: String,
    pub notes: String,
    pub cost_cents: i64,
    pub invoice_generated: bool,
}

/// Input for creating a lab test category.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct CreateLabTestCategory {
    pub name: String,
    pub description: String,
}

/// Input for updating a lab test category.
pub type UpdateLabTestCategory = CreateLabTestCategory;

/// Input for creating a lab staff member.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct CreateLabStaff {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub department: String,
    pub status: String,
}

/// Input for updating a lab staff member.
pub type UpdateLabStaff = CreateLabStaff;

/// Store for lab tests, categories, and staff.
#[derive(Clone)]
pub struct LabStore {
    pool: PgPool,
}

impl LabStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Lab tests
    // =========================================================================

    /// List active lab tests, optionally for one patient, newest first.
    pub async fn list_tests(
        &self,
        patient_id: Option<PatientId>,
    ) -> Result<Vec<LabTestRow>, DbError> {
        let sql = format!(
            r#"{SELECT_LAB_TEST}
            WHERE l.is_active AND ($1::bigint IS NULL OR l.patient_id = $1)
            ORDER BY l.test_date DESC
            "#
        );

        sqlx::query_as::<_, LabTestRow>(&sql)
            .bind(patient_id.map(|id| id.value()))
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::Query)
    }

    /// Fetch a single lab test by row id.
    pub async fn get_test(&self, id: LabTestId) -> Result<Option<LabTestRow>, DbError> {
        let sql = format!("{SELECT_LAB_TEST} WHERE l.lab_test_id = $1");
        sqlx::query_as::<_, LabTestRow>(&sql)
            .bind(id.value())
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::Query)
    }

    /// Create a lab test, generating the test number when absent.
    pub async fn create_test(&self, input: CreateLabTest) -> Result<LabTestRow, DbError> {
        let supplied = input.test_number.is_some();
        let mut attempts = if supplied { 1 } else { GENERATION_ATTEMPTS };

        loop {
            let number = match &input.test_number {
                Some(n) => n.clone(),
                None => numbering::next_number(
                    &self.pool,
                    LAB_TEST_NUMBER,
                    numbering::current_year(),
                )
                .await?
                .to_string(),
            };

            match self.insert_test(&input, &number).await {
                Ok(id) => {
                    info!(lab_test_id = %id, test_number = %number, "Lab test created");
                    return self.get_test(id).await?.ok_or(DbError::NotFound {
                        entity: "lab test",
                        id: id.value(),
                    });
                }
                Err(e) => {
                    attempts -= 1;
                    if !supplied
                        && attempts > 0
                        && numbering::is_number_collision(&e, LAB_TEST_NUMBER)
                    {
                        warn!(test_number = %number, "Lab test number collision, regenerating");
                        continue;
                    }
                    return Err(e);
                }
            }
        }
    }

    async fn insert_test(&self, input: &CreateLabTest, number: &str) -> Result<LabTestId, DbError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO lab_tests (
                test_number, patient_id, procedure_id, category_id,
                assigned_staff_id, test_name, test_date, sample_collection_date,
                status, notes, cost_cents
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING lab_test_id
            "#,
        )
        .bind(number)
        .bind(input.patient_id.value())
        .bind(input.procedure_id.map(|id| id.value()))
        .bind(input.category_id.value())
        .bind(input.assigned_staff_id.map(|id| id.value()))
        .bind(&input.test_name)
        .bind(input.test_date)
        .bind(input.sample_collection_date)
        .bind(&input.status)
        .bind(&input.notes)
        .bind(input.cost_cents)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from_write)?;

        Ok(LabTestId::new(id))
    }

    /// Update a lab test's mutable fields.
    pub async fn update_test(
        &self,
        id: LabTestId,
        input: UpdateLabTest,
    ) -> Result<LabTestRow, DbError> {
        let result = sqlx::query(
            r#"
            UPDATE lab_tests SET
                procedure_id = $2, category_id = $3, assigned_staff_id = $4,
                test_name = $5, test_date = $6, sample_collection_date = $7,
                report_date = $8, status = $9, report_file_path = $10,
                report_text = $11, notes = $12, cost_cents = $13,
                invoice_generated = $14, updated_at = now()
            WHERE lab_test_id = $1
            "#,
        )
        .bind(id.value())
        .bind(input.procedure_id.map(|id| id.value()))
        .bind(input.category_id.value())
        .bind(input.assigned_staff_id.map(|id| id.value()))
        .bind(&input.test_name)
        .bind(input.test_date)
        .bind(input.sample_collection_date)
        .bind(input.report_date)
        .bind(&input.status)
        .bind(&input.report_file_path)
        .bind(&input.report_text)
        .bind(&input.notes)
        .bind(input.cost_cents)
        .bind(input.invoice_generated)
        .execute(&self.pool)
        .await
        .map_err(DbError::from_write)?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound {
                entity: "lab test",
                id: id.value(),
            });
        }

        self.get_test(id).await?.ok_or(DbError::NotFound {
            entity: "lab test",
            id: id.value(),
        })
    }

    /// Soft-delete a lab test. The test number is never reused.
    pub async fn delete_test(&self, id: LabTestId) -> Result<(), DbError> {
        let result = sqlx::query(
            "UPDATE lab_tests SET is_active = FALSE, updated_at = now() WHERE lab_test_id = $1",
        )
        .bind(id.value())
        .execute(&self.pool)
        .await
        .map_err(DbError::Query)?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound {
                entity: "lab test",
                id: id.value(),
            });
        }
        Ok(())
    }

    // =========================================================================
    // Categories
    // =========================================================================

    /// List active categories, alphabetically.
    pub async fn list_categories(&self) -> Result<Vec<LabTestCategoryRow>, DbError> {
        sqlx::query_as::<_, LabTestCategoryRow>(
            "SELECT * FROM lab_test_categories WHERE is_active ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::Query)
    }

    /// Fetch a single category by row id.
    pub async fn get_category(
        &self,
        id: LabTestCategoryId,
    ) -> Result<Option<LabTestCategoryRow>, DbError> {
        sqlx::query_as::<_, LabTestCategoryRow>(
            "SELECT * FROM lab_test_categories WHERE category_id = $1",
        )
        .bind(id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::Query)
    }

    /// Create a category. Names are unique.
    pub async fn create_category(
        &self,
        input: CreateLabTestCategory,
    ) -> Result<LabTestCategoryRow, DbError> {
        sqlx::query_as::<_, LabTestCategoryRow>(
            r#"
            INSERT INTO lab_test_categories (name, description)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(&input.name)
        .bind(&input.description)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from_write)
    }

    /// Update a category.
    pub async fn update_category(
        &self,
        id: LabTestCategoryId,
        input: UpdateLabTestCategory,
    ) -> Result<LabTestCategoryRow, DbError> {
        sqlx::query_as::<_, LabTestCategoryRow>(
            r#"
            UPDATE lab_test_categories SET
                name = $2, description = $3, updated_at = now()
            WHERE category_id = $1
            RETURNING *
            "#,
        )
        .bind(id.value())
        .bind(&input.name)
        .bind(&input.description)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from_write)?
        .ok_or(DbError::NotFound {
            entity: "lab test category",
            id: id.value(),
        })
    }

    /// Soft-delete a category. Existing lab tests keep their reference.
    pub async fn delete_category(&self, id: LabTestCategoryId) -> Result<(), DbError> {
        let result = sqlx::query(
            "UPDATE lab_test_categories SET is_active = FALSE, updated_at = now() WHERE category_id = $1",
        )
        .bind(id.value())
        .execute(&self.pool)
        .await
        .map_err(DbError::Query)?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound {
                entity: "lab test category",
                id: id.value(),
            });
        }
        Ok(())
    }

    // =========================================================================
    // Lab staff
    // =========================================================================

    /// List active lab staff.
    pub async fn list_staff(&self) -> Result<Vec<LabStaffRow>, DbError> {
        sqlx::query_as::<_, LabStaffRow>(
            "SELECT * FROM lab_staff WHERE is_active ORDER BY last_name, first_name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::Query)
    }

    /// Fetch a single lab staff member by row id.
    pub async fn get_staff(&self, id: LabStaffId) -> Result<Option<LabStaffRow>, DbError> {
        sqlx::query_as::<_, LabStaffRow>("SELECT * FROM lab_staff WHERE lab_staff_id = $1")
            .bind(id.value())
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::Query)
    }

    /// Create a lab staff member.
    pub async fn create_staff(&self, input: CreateLabStaff) -> Result<LabStaffRow, DbError> {
        sqlx::query_as::<_, LabStaffRow>(
            r#"
            INSERT INTO lab_staff (first_name, last_name, email, phone, department, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.department)
        .bind(&input.status)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from_write)
    }

    /// Update a lab staff member.
    pub async fn update_staff(
        &self,
        id: LabStaffId,
        input: UpdateLabStaff,
    ) -> Result<LabStaffRow, DbError> {
        sqlx::query_as::<_, LabStaffRow>(
            r#"
            UPDATE lab_staff SET
                first_name = $2, last_name = $3, email = $4, phone = $5,
                department = $6, status = $7, updated_at = now()
            WHERE lab_staff_id = $1
            RETURNING *
            "#,
        )
        .bind(id.value())
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.department)
        .bind(&input.status)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from_write)?
        .ok_or(DbError::NotFound {
            entity: "lab staff",
            id: id.value(),
        })
    }

    /// Soft-delete a lab staff member.
    pub async fn delete_staff(&self, id: LabStaffId) -> Result<(), DbError> {
        let result = sqlx::query(
            "UPDATE lab_staff SET is_active = FALSE, updated_at = now() WHERE lab_staff_id = $1",
        )
        .bind(id.value())
        .execute(&self.pool)
        .await
        .map_err(DbError::Query)?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound {
                entity: "lab staff",
                id: id.value(),
            });
        }
        Ok(())
    }
}
