//! Transaction API endpoints.
//!
//! Every transaction carries both a TXN number and an INV invoice number.
//! Totals are derived server-side from amount and discount.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use carelane_id::{NumberKind, PatientId, RecordNumber, TransactionId};

use crate::api::authz;
use crate::api::error::{ApiError, FieldError};
use crate::api::request_context::RequestContext;
use crate::db::{CreateTransaction, UpdateTransaction};
use crate::state::AppState;

use super::ListResponse;

/// Create transaction routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_transactions).post(create_transaction))
        .route(
            "/{transaction_id}",
            get(get_transaction)
                .put(update_transaction)
                .delete(delete_transaction),
        )
}

/// Query filters for listing transactions.
#[derive(Debug, Deserialize)]
struct ListTransactionsQuery {
    patient_id: Option<i64>,
}

fn validate_amounts(
    amount_cents: i64,
    discount_cents: Option<i64>,
    request_id: &str,
) -> Result<(), ApiError> {
    let mut details = Vec::new();
    if amount_cents < 0 {
        details.push(FieldError {
            field: "amount_cents".to_string(),
            message: "amount cannot be negative".to_string(),
        });
    }
    if let Some(discount) = discount_cents {
        if discount < 0 {
            details.push(FieldError {
                field: "discount_cents".to_string(),
                message: "discount cannot be negative".to_string(),
            });
        } else if discount > amount_cents {
            details.push(FieldError {
                field: "discount_cents".to_string(),
                message: "discount cannot exceed the amount".to_string(),
            });
        }
    }

    if details.is_empty() {
        Ok(())
    } else {
        Err(
            ApiError::bad_request("invalid_amounts", "Invalid transaction amounts")
                .with_details(details)
                .with_request_id(request_id.to_string()),
        )
    }
}

/// GET /v1/transactions
async fn list_transactions(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    authz::require_staff(&state, &ctx).await?;

    let transactions = state
        .db()
        .transactions()
        .list(query.patient_id.map(PatientId::new))
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?;

    Ok(Json(ListResponse::new(transactions)))
}

/// POST /v1/transactions
async fn create_transaction(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<CreateTransaction>,
) -> Result<impl IntoResponse, ApiError> {
    let role = authz::require_staff(&state, &ctx).await?;
    authz::require_billing_write(role, &ctx.request_id)?;

    if let Some(number) = &req.transaction_number {
        RecordNumber::parse_as(NumberKind::Transaction, number).map_err(|e| {
            ApiError::bad_request("invalid_transaction_number", e.to_string())
                .with_request_id(ctx.request_id.clone())
        })?;
    }
    if let Some(number) = &req.invoice_number {
        RecordNumber::parse_as(NumberKind::Invoice, number).map_err(|e| {
            ApiError::bad_request("invalid_invoice_number", e.to_string())
                .with_request_id(ctx.request_id.clone())
        })?;
    }
    validate_amounts(req.amount_cents, req.discount_cents, &ctx.request_id)?;

    let transaction = state
        .db()
        .transactions()
        .create(req)
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?;

    Ok((StatusCode::CREATED, Json(transaction)))
}

/// GET /v1/transactions/{transaction_id}
async fn get_transaction(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(transaction_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    authz::require_staff(&state, &ctx).await?;

    let transaction = state
        .db()
        .transactions()
        .get(TransactionId::new(transaction_id))
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?
        .ok_or_else(|| {
            ApiError::not_found(
                "not_found",
                format!("transaction {transaction_id} not found"),
            )
            .with_request_id(ctx.request_id.clone())
        })?;

    Ok(Json(transaction))
}

/// PUT /v1/transactions/{transaction_id}
async fn update_transaction(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(transaction_id): Path<i64>,
    Json(req): Json<UpdateTransaction>,
) -> Result<impl IntoResponse, ApiError> {
    let role = authz::require_staff(&state, &ctx).await?;
    authz::require_billing_write(role, &ctx.request_id)?;

    validate_amounts(req.amount_cents, req.discount_cents, &ctx.request_id)?;

    let transaction = state
        .db()
        .transactions()
        .update(TransactionId::new(transaction_id), req)
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?;

    Ok(Json(transaction))
}

/// DELETE /v1/transactions/{transaction_id}
async fn delete_transaction(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(transaction_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let role = authz::require_staff(&state, &ctx).await?;
    authz::require_billing_write(role, &ctx.request_id)?;

    state
        .db()
        .transactions()
        .delete(TransactionId::new(transaction_id))
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discount_larger_than_amount_is_rejected() {
        let err = validate_amounts(10_00, Some(20_00), "req").unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn full_discount_is_allowed() {
        assert!(validate_amounts(10_00, Some(10_00), "req").is_ok());
    }
}
