//! Prescription API endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use carelane_id::{NumberKind, PatientId, PrescriptionId, ProcedureId, RecordNumber};

use crate::api::authz;
use crate::api::error::ApiError;
use crate::api::request_context::RequestContext;
use crate::db::{CreatePrescription, UpdatePrescription};
use crate::state::AppState;

use super::ListResponse;

/// Create prescription routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_prescriptions).post(create_prescription))
        .route(
            "/{prescription_id}",
            get(get_prescription)
                .put(update_prescription)
                .delete(delete_prescription),
        )
}

/// Query filters for listing prescriptions.
#[derive(Debug, Deserialize)]
struct ListPrescriptionsQuery {
    patient_id: Option<i64>,
    procedure_id: Option<i64>,
}

/// GET /v1/prescriptions
async fn list_prescriptions(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<ListPrescriptionsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    authz::require_staff(&state, &ctx).await?;

    let prescriptions = state
        .db()
        .prescriptions()
        .list(
            query.patient_id.map(PatientId::new),
            query.procedure_id.map(ProcedureId::new),
        )
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?;

    Ok(Json(ListResponse::new(prescriptions)))
}

/// POST /v1/prescriptions
async fn create_prescription(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<CreatePrescription>,
) -> Result<impl IntoResponse, ApiError> {
    let role = authz::require_staff(&state, &ctx).await?;
    authz::require_clinical_write(role, &ctx.request_id)?;

    if let Some(number) = &req.prescription_number {
        RecordNumber::parse_as(NumberKind::Prescription, number).map_err(|e| {
            ApiError::bad_request("invalid_prescription_number", e.to_string())
                .with_request_id(ctx.request_id.clone())
        })?;
    }
    if req.medications.trim().is_empty() {
        return Err(ApiError::bad_request(
            "invalid_prescription",
            "medications cannot be empty",
        )
        .with_request_id(ctx.request_id.clone()));
    }

    let prescription = state
        .db()
        .prescriptions()
        .create(req)
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?;

    Ok((StatusCode::CREATED, Json(prescription)))
}

/// GET /v1/prescriptions/{prescription_id}
async fn get_prescription(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(prescription_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    authz::require_staff(&state, &ctx).await?;

    let prescription = state
        .db()
        .prescriptions()
        .get(PrescriptionId::new(prescription_id))
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?
        .ok_or_else(|| {
            ApiError::not_found(
                "not_found",
                format!("prescription {prescription_id} not found"),
            )
            .with_request_id(ctx.request_id.clone())
        })?;

    Ok(Json(prescription))
}

/// PUT /v1/prescriptions/{prescription_id}
async fn update_prescription(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(prescription_id): Path<i64>,
    Json(req): Json<UpdatePrescription>,
) -> Result<impl IntoResponse, ApiError> {
    let role = authz::require_staff(&state, &ctx).await?;
    authz::require_clinical_write(role, &ctx.request_id)?;

    let prescription = state
        .db()
        .prescriptions()
        .update(PrescriptionId::new(prescription_id), req)
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?;

    Ok(Json(prescription))
}

/// DELETE /v1/prescriptions/{prescription_id}
async fn delete_prescription(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(prescription_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let role = authz::require_staff(&state, &ctx).await?;
    authz::require_clinical_write(role, &ctx.request_id)?;

    state
        .db()
        .prescriptions()
        .delete(PrescriptionId::new(prescription_id))
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?;

    Ok(StatusCode::NO_CONTENT)
}
