//! Dashboard API endpoints: aggregate counts and per-period statistics.

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{Datelike, NaiveDate, Utc};
use serde::Deserialize;

use crate::api::authz;
use crate::api::error::ApiError;
use crate::api::request_context::RequestContext;
use crate::state::AppState;

use super::ListResponse;

/// Create dashboard routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/summary", get(get_summary))
        .route("/monthly", get(get_monthly))
        .route("/daily-appointments", get(get_daily_appointments))
}

/// Query for GET /monthly; defaults to the current month.
#[derive(Debug, Deserialize)]
struct MonthlyQuery {
    month: Option<u32>,
    year: Option<i32>,
}

/// Query for GET /daily-appointments; defaults to today.
#[derive(Debug, Deserialize)]
struct DailyQuery {
    date: Option<NaiveDate>,
}

/// GET /v1/dashboard/summary
async fn get_summary(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<impl IntoResponse, ApiError> {
    authz::require_staff(&state, &ctx).await?;

    let summary = state
        .db()
        .dashboard()
        .summary()
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?;

    Ok(Json(summary))
}

/// GET /v1/dashboard/monthly
async fn get_monthly(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<MonthlyQuery>,
) -> Result<impl IntoResponse, ApiError> {
    authz::require_staff(&state, &ctx).await?;

    let today = Utc::now().date_naive();
    let month = query.month.unwrap_or(today.month());
    let year = query.year.unwrap_or(today.year());

    if !(1..=12).contains(&month) {
        return Err(
            ApiError::bad_request("invalid_month", "month must be between 1 and 12")
                .with_request_id(ctx.request_id.clone()),
        );
    }

    let stats = state
        .db()
        .dashboard()
        .monthly_statistics(month, year)
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?;

    Ok(Json(stats))
}

/// GET /v1/dashboard/daily-appointments
async fn get_daily_appointments(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<DailyQuery>,
) -> Result<impl IntoResponse, ApiError> {
    authz::require_staff(&state, &ctx).await?;

    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());

    let appointments = state
        .db()
        .dashboard()
        .daily_appointments(date)
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?;

    Ok(Json(ListResponse::new(appointments)))
}
