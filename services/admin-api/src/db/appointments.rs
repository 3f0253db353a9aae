//! Appointment store.
//!
//! Appointments reference their patient (required) and optionally a doctor
//! and nurse. List reads join the display names the way the original screens
//! showed them. Notification marking only records the flags; delivery is out
//! of scope.

use carelane_id::{AppointmentId, DoctorId, NurseId, PatientId};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::{postgres::PgPool, postgres::PgRow, Row};
use tracing::{info, warn};

use super::numbering::{self, APPOINTMENT_NUMBER, GENERATION_ATTEMPTS};
use super::DbError;

const SELECT_APPOINTMENT: &str = r#"
    SELECT a.*, p.first_name || ' ' || p.last_name AS patient_name,
           d.first_name || ' ' || d.last_name AS doctor_name,
           n.first_name || ' ' || n.last_name AS nurse_name
    FROM appointments a
    JOIN patients p ON p.patient_id = a.patient_id
    LEFT JOIN doctors d ON d.doctor_id = a.doctor_id
    LEFT JOIN nurses n ON n.nurse_id = a.nurse_id
"#;

/// A row from the appointments table with joined display names.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AppointmentRow {
    pub appointment_id: AppointmentId,
    pub appointment_number: String,
    pub patient_id: PatientId,
    pub doctor_id: Option<DoctorId>,
    pub nurse_id: Option<NurseId>,
    pub patient_name: String,
    pub doctor_name: Option<String>,
    pub nurse_name: Option<String>,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub appointment_type: String,
    pub status: String,
    pub reason: String,
    pub notes: String,
    pub sms_notification_sent: bool,
    pub whatsapp_notification_sent: bool,
    pub notification_sent_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for AppointmentRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            appointment_id: AppointmentId::new(row.try_get("appointment_id")?),
            appointment_number: row.try_get("appointment_number")?,
            patient_id: PatientId::new(row.try_get("patient_id")?),
            doctor_id: row.try_get::<Option<i64>, _>("doctor_id")?.map(DoctorId::new),
            nurse_id: row.try_get::<Option<i64>, _>("nurse_id")?.map(NurseId::new),
            patient_name: row.try_get("patient_name")?,
            doctor_name: row.try_get("doctor_name")?,
            nurse_name: row.try_get("nurse_name")?,
            appointment_date: row.try_get("appointment_date")?,
            appointment_time: row.try_get("appointment_time")?,
            appointment_type: row.try_get("appointment_type")?,
            status: row.try_get("status")?,
            reason: row.try_get("reason")?,
            notes: row.try_get("notes")?,
            sms_notification_sent: row.try_get("sms_notification_sent")?,
            whatsapp_notification_sent: row.try_get("whatsapp_notification_sent")?,
            notification_sent_at: row.try_get("notification_sent_at")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Notification channel flags on an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    Sms,
    Whatsapp,
}

impl NotificationChannel {
    fn column(self) -> &'static str {
        match self {
            NotificationChannel::Sms => "sms_notification_sent",
            NotificationChannel::Whatsapp => "whatsapp_notification_sent",
        }
    }
}

/// Input for creating an appointment.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct CreateAppointment {
    /// Caller-supplied appointment number; generated when absent.
    pub appointment_number: Option<String>,
    pub patient_id: PatientId,
    pub doctor_id: Option<DoctorId>,
    pub nurse_id: Option<NurseId>,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub appointment_type: String,
    pub status: String,
    pub reason: String,
    pub notes: String,
}

/// Input for updating an appointment. The appointment number is immutable.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct UpdateAppointment {
    pub doctor_id: Option<DoctorId>,
    pub nurse_id: Option<NurseId>,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub appointment_type: String,
    pub status: String,
    pub reason: String,
    pub notes: String,
}

/// Store for appointment records.
#[derive(Clone)]
pub struct AppointmentStore {
    pool: PgPool,
}

impl AppointmentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// List active appointments with optional date / patient / doctor
    /// filters, newest first (date filter sorts by time of day instead).
    pub async fn list(
        &self,
        date: Option<NaiveDate>,
        patient_id: Option<PatientId>,
        doctor_id: Option<DoctorId>,
    ) -> Result<Vec<AppointmentRow>, DbError> {
        let sql = format!(
            r#"{SELECT_APPOINTMENT}
            WHERE a.is_active
              AND ($1::date IS NULL OR a.appointment_date = $1)
              AND ($2::bigint IS NULL OR a.patient_id = $2)
              AND ($3::bigint IS NULL OR a.doctor_id = $3)
            ORDER BY
              CASE WHEN $1::date IS NULL THEN NULL ELSE a.appointment_time END ASC,
              a.appointment_date DESC
            "#
        );

        sqlx::query_as::<_, AppointmentRow>(&sql)
            .bind(date)
            .bind(patient_id.map(|id| id.value()))
            .bind(doctor_id.map(|id| id.value()))
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::Query)
    }

    /// Fetch a single appointment by row id.
    pub async fn get(&self, id: AppointmentId) -> Result<Option<AppointmentRow>, DbError> {
        let sql = format!("{SELECT_APPOINTMENT} WHERE a.appointment_id = $1");
        sqlx::query_as::<_, AppointmentRow>(&sql)
            .bind(id.value())
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::Query)
    }

    /// Create an appointment, generating the appointment number when absent.
    pub async fn create(&self, input: CreateAppointment) -> Result<AppointmentRow, DbError> {
        let supplied = input.appointment_number.is_some();
        let mut attempts = if supplied { 1 } else { GENERATION_ATTEMPTS };

        loop {
            let number = match &input.appointment_number {
                Some(n) => n.clone(),
                None => numbering::next_number(
                    &self.pool,
                    APPOINTMENT_NUMBER,
                    numbering::current_year(),
                )
                .await?
                .to_string(),
            };

            match self.insert(&input, &number).await {
                Ok(id) => {
                    info!(appointment_id = %id, appointment_number = %number, "Appointment created");
                    return self.get(id).await?.ok_or(DbError::NotFound {
                        entity: "appointment",
                        id: id.value(),
                    });
                }
                Err(e) => {
                    attempts -= 1;
                    if !supplied
                        && attempts > 0
                        && numbering::is_number_collision(&e, APPOINTMENT_NUMBER)
                    {
                        warn!(appointment_number = %number, "Appointment number collision, regenerating");
                        continue;
                    }
                    return Err(e);
                }
            }
        }
    }

    async fn insert(
        &self,
        input: &CreateAppointment,
        number: &str,
    ) -> Result<AppointmentId, DbError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO appointments (
                appointment_number, patient_id, doctor_id, nurse_id,
                appointment_date, appointment_time, appointment_type, status,
                reason, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING appointment_id
            "#,
        )
        .bind(number)
        .bind(input.patient_id.value())
        .bind(input.doctor_id.map(|id| id.value()))
        .bind(input.nurse_id.map(|id| id.value()))
        .bind(input.appointment_date)
        .bind(input.appointment_time)
        .bind(&input.appointment_type)
        .bind(&input.status)
        .bind(&input.reason)
        .bind(&input.notes)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from_write)?;

        Ok(AppointmentId::new(id))
    }

    /// Update an appointment's mutable fields.
    pub async fn update(
        &self,
        id: AppointmentId,
        input: UpdateAppointment,
    ) -> Result<AppointmentRow, DbError> {
        let result = sqlx::query(
            r#"
            UPDATE appointments SET
                doctor_id = $2, nurse_id = $3, appointment_date = $4,
                appointment_time = $5, appointment_type = $6, status = $7,
                reason = $8, notes = $9, updated_at = now()
            WHERE appointment_id = $1
            "#,
        )
        .bind(id.value())
        .bind(input.doctor_id.map(|id| id.value()))
        .bind(input.nurse_id.map(|id| id.value()))
        .bind(input.appointment_date)
        .bind(input.appointment_time)
        .bind(&input.appointment_type)
        .bind(&input.status)
        .bind(&input.reason)
        .bind(&input.notes)
        .execute(&self.pool)
        .await
        .map_err(DbError::from_write)?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound {
                entity: "appointment",
                id: id.value(),
            });
        }

        self.get(id).await?.ok_or(DbError::NotFound {
            entity: "appointment",
            id: id.value(),
        })
    }

    /// Soft-delete an appointment. The appointment number is never reused.
    pub async fn delete(&self, id: AppointmentId) -> Result<(), DbError> {
        let result = sqlx::query(
            "UPDATE appointments SET is_active = FALSE, updated_at = now() WHERE appointment_id = $1",
        )
        .bind(id.value())
        .execute(&self.pool)
        .await
        .map_err(DbError::Query)?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound {
                entity: "appointment",
                id: id.value(),
            });
        }
        Ok(())
    }

    /// Record that a notification was sent for this appointment.
    ///
    /// Only the flags and timestamp are stored; nothing is delivered.
    pub async fn mark_notification(
        &self,
        id: AppointmentId,
        channel: NotificationChannel,
    ) -> Result<AppointmentRow, DbError> {
        let column = channel.column();

        let sql = format!(
            "UPDATE appointments SET {column} = TRUE, notification_sent_at = now(), \
             updated_at = now() WHERE appointment_id = $1"
        );

        let result = sqlx::query(&sql)
            .bind(id.value())
            .execute(&self.pool)
            .await
            .map_err(DbError::Query)?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound {
                entity: "appointment",
                id: id.value(),
            });
        }

        self.get(id).await?.ok_or(DbError::NotFound {
            entity: "appointment",
            id: id.value(),
        })
    }
}
