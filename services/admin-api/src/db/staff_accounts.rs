//! Staff account store.
//!
//! Staff accounts back the authorization layer: the dev-stub bearer token
//! carries an email, and the account row supplies the role. Accounts are
//! managed out of band (seed migration or operator SQL); the API only reads
//! them.

use carelane_id::StaffAccountId;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPool, postgres::PgRow, Row};

use super::DbError;

/// A row from the staff_accounts table.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StaffAccountRow {
    pub staff_account_id: StaffAccountId,
    pub email: String,
    pub display_name: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for StaffAccountRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            staff_account_id: StaffAccountId::new(row.try_get("staff_account_id")?),
            email: row.try_get("email")?,
            display_name: row.try_get("display_name")?,
            role: row.try_get("role")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Store for staff accounts.
#[derive(Clone)]
pub struct StaffAccountStore {
    pool: PgPool,
}

impl StaffAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fetch an active account by email.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<StaffAccountRow>, DbError> {
        sqlx::query_as::<_, StaffAccountRow>(
            "SELECT * FROM staff_accounts WHERE email = $1 AND is_active",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::Query)
    }
}
