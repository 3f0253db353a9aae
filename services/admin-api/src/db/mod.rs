//! Database layer for the admin API.
//!
//! This module provides:
//! - Connection pool management
//! - One store per entity family (patients, appointments, billing, ...)
//! - Record number issuance against the stored series
//!
//! The database layer uses SQLx with Postgres.

mod appointments;
mod dashboard;
mod doctors;
mod error;
mod lab;
pub mod numbering;
mod nurses;
mod patients;
mod prescriptions;
mod procedures;
mod staff_accounts;
mod transactions;

pub use appointments::{
    AppointmentRow, AppointmentStore, CreateAppointment, NotificationChannel, UpdateAppointment,
};
pub use dashboard::{DailyAppointmentRow, DashboardStore, DashboardSummary, MonthlyStatistics};
pub use doctors::{
    CreateDoctor, DoctorRow, DoctorScheduleEntry, DoctorScheduleRow, DoctorStatistics, DoctorStore,
    UpdateDoctor,
};
pub use error::DbError;
pub use lab::{
    CreateLabStaff, CreateLabTest, CreateLabTestCategory, LabStaffRow, LabStore,
    LabTestCategoryRow, LabTestRow, UpdateLabStaff, UpdateLabTest, UpdateLabTestCategory,
};
pub use nurses::{CreateNurse, NurseRow, NurseStore, UpdateNurse};
pub use patients::{CreatePatient, PatientDetail, PatientRow, PatientStore, UpdatePatient};
pub use prescriptions::{
    CreatePrescription, PrescriptionRow, PrescriptionStore, UpdatePrescription,
};
pub use procedures::{CreateProcedure, ProcedureRow, ProcedureStore, UpdateProcedure};
pub use staff_accounts::{StaffAccountRow, StaffAccountStore};
pub use transactions::{
    CreateTransaction, TransactionRow, TransactionStore, UpdateTransaction,
};

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

/// Database configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Database connection URL.
    pub database_url: String,

    /// Maximum number of connections in the pool.
    pub max_connections: u32,

    /// Minimum number of idle connections.
    pub min_connections: u32,

    /// Connection acquire timeout.
    pub acquire_timeout: Duration,

    /// Idle connection timeout.
    pub idle_timeout: Duration,

    /// Maximum lifetime of a connection.
    pub max_lifetime: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/carelane".to_string(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
        }
    }
}

impl DbConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/carelane".to_string());

        let max_connections = std::env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        let min_connections = std::env::var("DB_MIN_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1);

        Self {
            database_url,
            max_connections,
            min_connections,
            ..Default::default()
        }
    }
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Connecting to database"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .max_lifetime(Some(config.max_lifetime))
            .connect(&config.database_url)
            .await
            .map_err(DbError::Connect)?;

        info!("Database connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check if the database is reachable.
    pub async fn health_check(&self) -> Result<(), DbError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(DbError::Query)?;
        Ok(())
    }

    /// Run pending migrations.
    ///
    /// Note: In production, migrations should be run via a separate migration
    /// tool or as part of deployment. This method uses runtime migration
    /// loading.
    pub async fn run_migrations(&self) -> Result<(), DbError> {
        info!("Running database migrations");

        let candidates = vec![
            std::path::PathBuf::from("./migrations"),
            std::path::PathBuf::from("services/admin-api/migrations"),
            std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("migrations"),
        ];
        let mut last_error: Option<sqlx::migrate::MigrateError> = None;

        for dir in &candidates {
            match sqlx::migrate::Migrator::new(dir.clone()).await {
                Ok(migrator) => {
                    info!(migrations_dir = %dir.display(), "Loaded migrations");
                    migrator.run(&self.pool).await.map_err(DbError::Migration)?;
                    info!("Database migrations complete");
                    return Ok(());
                }
                Err(e) => {
                    last_error = Some(e);
                }
            }
        }

        let tried = candidates
            .iter()
            .map(|dir| dir.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");

        Err(DbError::MigrationDirNotFound {
            tried,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown error".to_string()),
        })
    }

    /// Get a patient store handle.
    pub fn patients(&self) -> PatientStore {
        PatientStore::new(self.pool.clone())
    }

    /// Get a doctor store handle.
    pub fn doctors(&self) -> DoctorStore {
        DoctorStore::new(self.pool.clone())
    }

    /// Get a nurse store handle.
    pub fn nurses(&self) -> NurseStore {
        NurseStore::new(self.pool.clone())
    }

    /// Get an appointment store handle.
    pub fn appointments(&self) -> AppointmentStore {
        AppointmentStore::new(self.pool.clone())
    }

    /// Get a procedure store handle.
    pub fn procedures(&self) -> ProcedureStore {
        ProcedureStore::new(self.pool.clone())
    }

    /// Get a lab store handle (tests, categories, staff).
    pub fn lab(&self) -> LabStore {
        LabStore::new(self.pool.clone())
    }

    /// Get a prescription store handle.
    pub fn prescriptions(&self) -> PrescriptionStore {
        PrescriptionStore::new(self.pool.clone())
    }

    /// Get a transaction store handle.
    pub fn transactions(&self) -> TransactionStore {
        TransactionStore::new(self.pool.clone())
    }

    /// Get a dashboard store handle.
    pub fn dashboard(&self) -> DashboardStore {
        DashboardStore::new(self.pool.clone())
    }

    /// Get a staff account store handle.
    pub fn staff_accounts(&self) -> StaffAccountStore {
        StaffAccountStore::new(self.pool.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_config_defaults() {
        let config = DbConfig::default();
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 1);
    }
}
