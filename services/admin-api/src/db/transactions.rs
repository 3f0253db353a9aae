//! Billing transaction store.
//!
//! Transactions carry two number series: the TXN transaction number and the
//! INV invoice number, both issued at creation when absent. The stored total
//! is always derived from amount and discount, on create and update alike.

use carelane_id::{AppointmentId, LabTestId, PatientId, ProcedureId, TransactionId};
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPool, postgres::PgRow, Row};
use tracing::{info, warn};

use super::numbering::{self, GENERATION_ATTEMPTS, INVOICE_NUMBER, TRANSACTION_NUMBER};
use super::DbError;

const SELECT_TRANSACTION: &str = r#"
    SELECT t.*, p.first_name || ' ' || p.last_name AS patient_name
    FROM transactions t
    JOIN patients p ON p.patient_id = t.patient_id
"#;

/// A row from the transactions table with the joined patient name.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TransactionRow {
    pub transaction_id: TransactionId,
    pub transaction_number: String,
    pub invoice_number: String,
    pub patient_id: PatientId,
    pub appointment_id: Option<AppointmentId>,
    pub procedure_id: Option<ProcedureId>,
    pub lab_test_id: Option<LabTestId>,
    pub patient_name: String,
    pub transaction_type: String,
    pub payment_mode: String,
    pub amount_cents: i64,
    pub discount_cents: Option<i64>,
    pub total_cents: i64,
    pub transaction_date: DateTime<Utc>,
    pub status: String,
    pub notes: String,
    pub payment_confirmation_sent: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for TransactionRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            transaction_id: TransactionId::new(row.try_get("transaction_id")?),
            transaction_number: row.try_get("transaction_number")?,
            invoice_number: row.try_get("invoice_number")?,
            patient_id: PatientId::new(row.try_get("patient_id")?),
            appointment_id: row
                .try_get::<Option<i64>, _>("appointment_id")?
                .map(AppointmentId::new),
            procedure_id: row
                .try_get::<Option<i64>, _>("procedure_id")?
                .map(ProcedureId::new),
            lab_test_id: row
                .try_get::<Option<i64>, _>("lab_test_id")?
                .map(LabTestId::new),
            patient_name: row.try_get("patient_name")?,
            transaction_type: row.try_get("transaction_type")?,
            payment_mode: row.try_get("payment_mode")?,
            amount_cents: row.try_get("amount_cents")?,
            discount_cents: row.try_get("discount_cents")?,
            total_cents: row.try_get("total_cents")?,
            transaction_date: row.try_get("transaction_date")?,
            status: row.try_get("status")?,
            notes: row.try_get("notes")?,
            payment_confirmation_sent: row.try_get("payment_confirmation_sent")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Input for creating a transaction.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct CreateTransaction {
    /// Caller-supplied numbers; generated when absent.
    pub transaction_number: Option<String>,
    pub invoice_number: Option<String>,
    pub patient_id: PatientId,
    pub appointment_id: Option<AppointmentId>,
    pub procedure_id: Option<ProcedureId>,
    pub lab_test_id: Option<LabTestId>,
    pub transaction_type: String,
    pub payment_mode: String,
    pub amount_cents: i64,
    pub discount_cents: Option<i64>,
    pub transaction_date: Option<DateTime<Utc>>,
    pub status: String,
    pub notes: String,
}

/// Input for updating a transaction. Both numbers are immutable.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct UpdateTransaction {
    pub payment_mode: String,
    pub amount_cents: i64,
    pub discount_cents: Option<i64>,
    pub status: String,
    pub notes: String,
    pub payment_confirmation_sent: bool,
}

/// The derived invoice total.
fn total_cents(amount_cents: i64, discount_cents: Option<i64>) -> i64 {
    amount_cents - discount_cents.unwrap_or(0)
}

/// Store for billing transactions.
#[derive(Clone)]
pub struct TransactionStore {
    pool: PgPool,
}

impl TransactionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// List active transactions, optionally for one patient, newest first.
    pub async fn list(
        &self,
        patient_id: Option<PatientId>,
    ) -> Result<Vec<TransactionRow>, DbError> {
        let sql = format!(
            r#"{SELECT_TRANSACTION}
            WHERE t.is_active AND ($1::bigint IS NULL OR t.patient_id = $1)
            ORDER BY t.transaction_date DESC
            "#
        );

        sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(patient_id.map(|id| id.value()))
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::Query)
    }

    /// Fetch a single transaction by row id.
    pub async fn get(&self, id: TransactionId) -> Result<Option<TransactionRow>, DbError> {
        let sql = format!("{SELECT_TRANSACTION} WHERE t.transaction_id = $1");
        sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(id.value())
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::Query)
    }

    /// Create a transaction, generating the TXN and INV numbers when absent.
    ///
    /// Each auto-generated series is retried independently on collision; a
    /// caller-supplied number propagates its conflict unchanged.
    pub async fn create(&self, input: CreateTransaction) -> Result<TransactionRow, DbError> {
        let txn_supplied = input.transaction_number.is_some();
        let inv_supplied = input.invoice_number.is_some();
        let mut attempts = if txn_supplied && inv_supplied {
            1
        } else {
            GENERATION_ATTEMPTS
        };

        loop {
            let year = numbering::current_year();
            let txn_number = match &input.transaction_number {
                Some(n) => n.clone(),
                None => numbering::next_number(&self.pool, TRANSACTION_NUMBER, year)
                    .await?
                    .to_string(),
            };
            let inv_number = match &input.invoice_number {
                Some(n) => n.clone(),
                None => numbering::next_number(&self.pool, INVOICE_NUMBER, year)
                    .await?
                    .to_string(),
            };

            match self.insert(&input, &txn_number, &inv_number).await {
                Ok(id) => {
                    info!(
                        transaction_id = %id,
                        transaction_number = %txn_number,
                        invoice_number = %inv_number,
                        "Transaction created"
                    );
                    return self.get(id).await?.ok_or(DbError::NotFound {
                        entity: "transaction",
                        id: id.value(),
                    });
                }
                Err(e) => {
                    attempts -= 1;
                    let retryable = (!txn_supplied
                        && numbering::is_number_collision(&e, TRANSACTION_NUMBER))
                        || (!inv_supplied && numbering::is_number_collision(&e, INVOICE_NUMBER));
                    if retryable && attempts > 0 {
                        warn!(
                            transaction_number = %txn_number,
                            invoice_number = %inv_number,
                            "Billing number collision, regenerating"
                        );
                        continue;
                    }
                    return Err(e);
                }
            }
        }
    }

    async fn insert(
        &self,
        input: &CreateTransaction,
        txn_number: &str,
        inv_number: &str,
    ) -> Result<TransactionId, DbError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO transactions (
                transaction_number, invoice_number, patient_id, appointment_id,
                procedure_id, lab_test_id, transaction_type, payment_mode,
                amount_cents, discount_cents, total_cents, transaction_date,
                status, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
                    COALESCE($12, now()), $13, $14)
            RETURNING transaction_id
            "#,
        )
        .bind(txn_number)
        .bind(inv_number)
        .bind(input.patient_id.value())
        .bind(input.appointment_id.map(|id| id.value()))
        .bind(input.procedure_id.map(|id| id.value()))
        .bind(input.lab_test_id.map(|id| id.value()))
        .bind(&input.transaction_type)
        .bind(&input.payment_mode)
        .bind(input.amount_cents)
        .bind(input.discount_cents)
        .bind(total_cents(input.amount_cents, input.discount_cents))
        .bind(input.transaction_date)
        .bind(&input.status)
        .bind(&input.notes)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from_write)?;

        Ok(TransactionId::new(id))
    }

    /// Update a transaction's mutable fields, recomputing the total.
    pub async fn update(
        &self,
        id: TransactionId,
        input: UpdateTransaction,
    ) -> Result<TransactionRow, DbError> {
        let result = sqlx::query(
            r#"
            UPDATE transactions SET
                payment_mode = $2, amount_cents = $3, discount_cents = $4,
                total_cents = $5, status = $6, notes = $7,
                payment_confirmation_sent = $8, updated_at = now()
            WHERE transaction_id = $1
            "#,
        )
        .bind(id.value())
        .bind(&input.payment_mode)
        .bind(input.amount_cents)
        .bind(input.discount_cents)
        .bind(total_cents(input.amount_cents, input.discount_cents))
        .bind(&input.status)
        .bind(&input.notes)
        .bind(input.payment_confirmation_sent)
        .execute(&self.pool)
        .await
        .map_err(DbError::from_write)?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound {
                entity: "transaction",
                id: id.value(),
            });
        }

        self.get(id).await?.ok_or(DbError::NotFound {
            entity: "transaction",
            id: id.value(),
        })
    }

    /// Soft-delete a transaction. Neither number is ever reused.
    pub async fn delete(&self, id: TransactionId) -> Result<(), DbError> {
        let result = sqlx::query(
            "UPDATE transactions SET is_active = FALSE, updated_at = now() WHERE transaction_id = $1",
        )
        .bind(id.value())
        .execute(&self.pool)
        .await
        .map_err(DbError::Query)?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound {
                entity: "transaction",
                id: id.value(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_subtracts_discount() {
        assert_eq!(total_cents(10_000, Some(1_500)), 8_500);
        assert_eq!(total_cents(10_000, None), 10_000);
    }
}
