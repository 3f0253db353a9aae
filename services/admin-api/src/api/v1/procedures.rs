//! Procedure API endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use carelane_id::{DoctorId, NumberKind, PatientId, ProcedureId, RecordNumber};

use crate::api::authz;
use crate::api::error::ApiError;
use crate::api::request_context::RequestContext;
use crate::db::{CreateProcedure, UpdateProcedure};
use crate::state::AppState;

use super::ListResponse;

/// Create procedure routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_procedures).post(create_procedure))
        .route(
            "/{procedure_id}",
            get(get_procedure)
                .put(update_procedure)
                .delete(delete_procedure),
        )
}

/// Query filters for listing procedures.
#[derive(Debug, Deserialize)]
struct ListProceduresQuery {
    patient_id: Option<i64>,
    doctor_id: Option<i64>,
}

/// GET /v1/procedures
async fn list_procedures(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<ListProceduresQuery>,
) -> Result<impl IntoResponse, ApiError> {
    authz::require_staff(&state, &ctx).await?;

    let procedures = state
        .db()
        .procedures()
        .list(
            query.patient_id.map(PatientId::new),
            query.doctor_id.map(DoctorId::new),
        )
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?;

    Ok(Json(ListResponse::new(procedures)))
}

/// POST /v1/procedures
async fn create_procedure(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<CreateProcedure>,
) -> Result<impl IntoResponse, ApiError> {
    let role = authz::require_staff(&state, &ctx).await?;
    authz::require_clinical_write(role, &ctx.request_id)?;

    if let Some(number) = &req.procedure_number {
        RecordNumber::parse_as(NumberKind::Procedure, number).map_err(|e| {
            ApiError::bad_request("invalid_procedure_number", e.to_string())
                .with_request_id(ctx.request_id.clone())
        })?;
    }
    if req.cost_cents < 0 {
        return Err(
            ApiError::bad_request("invalid_cost", "cost cannot be negative")
                .with_request_id(ctx.request_id.clone()),
        );
    }

    let procedure = state
        .db()
        .procedures()
        .create(req)
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?;

    Ok((StatusCode::CREATED, Json(procedure)))
}

/// GET /v1/procedures/{procedure_id}
async fn get_procedure(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(procedure_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    authz::require_staff(&state, &ctx).await?;

    let procedure = state
        .db()
        .procedures()
        .get(ProcedureId::new(procedure_id))
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?
        .ok_or_else(|| {
            ApiError::not_found("not_found", format!("procedure {procedure_id} not found"))
                .with_request_id(ctx.request_id.clone())
        })?;

    Ok(Json(procedure))
}

/// PUT /v1/procedures/{procedure_id}
async fn update_procedure(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(procedure_id): Path<i64>,
    Json(req): Json<UpdateProcedure>,
) -> Result<impl IntoResponse, ApiError> {
    let role = authz::require_staff(&state, &ctx).await?;
    authz::require_clinical_write(role, &ctx.request_id)?;

    if req.cost_cents < 0 {
        return Err(
            ApiError::bad_request("invalid_cost", "cost cannot be negative")
                .with_request_id(ctx.request_id.clone()),
        );
    }

    let procedure = state
        .db()
        .procedures()
        .update(ProcedureId::new(procedure_id), req)
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?;

    Ok(Json(procedure))
}

/// DELETE /v1/procedures/{procedure_id}
async fn delete_procedure(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(procedure_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let role = authz::require_staff(&state, &ctx).await?;
    authz::require_clinical_write(role, &ctx.request_id)?;

    state
        .db()
        .procedures()
        .delete(ProcedureId::new(procedure_id))
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?;

    Ok(StatusCode::NO_CONTENT)
}
