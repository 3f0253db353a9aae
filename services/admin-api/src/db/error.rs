//! Database error types.

use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Failed to connect to the database.
    #[error("failed to connect to database: {0}")]
    Connect(#[source] sqlx::Error),

    /// Failed to execute a query.
    #[error("query failed: {0}")]
    Query(#[source] sqlx::Error),

    /// Failed to run migrations.
    #[error("migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),

    /// Migration directory not found in the current environment.
    #[error("migration directory not found; tried {tried}. Last error: {last_error}. Run from repo root or services/admin-api.")]
    MigrationDirNotFound { tried: String, last_error: String },

    /// An insert or update hit a unique constraint.
    ///
    /// For record-number columns this is the read-then-write race surfacing:
    /// two requests computed the same next sequence and the index rejected
    /// the second write. The caller decides whether to retry generation.
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    /// An insert or update referenced a missing row.
    #[error("foreign key constraint violated: {constraint}")]
    ForeignKeyViolation { constraint: String },

    /// The requested row does not exist (or is soft-deleted).
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// A delete was rejected because active dependent records exist.
    #[error("{entity} {id} still has active {dependents}")]
    RestrictedDelete {
        entity: &'static str,
        id: i64,
        dependents: &'static str,
    },
}

impl DbError {
    /// Classifies a sqlx error from a write, surfacing constraint violations.
    pub fn from_write(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e {
            let constraint = db_err.constraint().map(str::to_string);
            if db_err.is_unique_violation() {
                return DbError::UniqueViolation {
                    constraint: constraint.unwrap_or_else(|| "unknown".to_string()),
                };
            }
            if db_err.is_foreign_key_violation() {
                return DbError::ForeignKeyViolation {
                    constraint: constraint.unwrap_or_else(|| "unknown".to_string()),
                };
            }
        }
        DbError::Query(e)
    }

    /// Returns the violated constraint name, if this is a unique violation.
    pub fn unique_constraint(&self) -> Option<&str> {
        match self {
            DbError::UniqueViolation { constraint } => Some(constraint),
            _ => None,
        }
    }
}
