//! Nurse API endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use carelane_id::NurseId;

use crate::api::authz;
use crate::api::error::{ApiError, FieldError};
use crate::api::request_context::RequestContext;
use crate::db::{CreateNurse, UpdateNurse};
use crate::state::AppState;

use super::ListResponse;

/// Create nurse routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_nurses).post(create_nurse))
        .route(
            "/{nurse_id}",
            get(get_nurse).put(update_nurse).delete(delete_nurse),
        )
}

fn validate_nurse(req: &CreateNurse, request_id: &str) -> Result<(), ApiError> {
    let mut details = Vec::new();
    if req.first_name.trim().is_empty() {
        details.push(FieldError {
            field: "first_name".to_string(),
            message: "first name cannot be empty".to_string(),
        });
    }
    if req.last_name.trim().is_empty() {
        details.push(FieldError {
            field: "last_name".to_string(),
            message: "last name cannot be empty".to_string(),
        });
    }

    if details.is_empty() {
        Ok(())
    } else {
        Err(ApiError::bad_request("invalid_nurse", "Invalid nurse fields")
            .with_details(details)
            .with_request_id(request_id.to_string()))
    }
}

/// GET /v1/nurses
async fn list_nurses(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<impl IntoResponse, ApiError> {
    authz::require_staff(&state, &ctx).await?;

    let nurses = state
        .db()
        .nurses()
        .list()
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?;

    Ok(Json(ListResponse::new(nurses)))
}

/// POST /v1/nurses
async fn create_nurse(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<CreateNurse>,
) -> Result<impl IntoResponse, ApiError> {
    let role = authz::require_staff(&state, &ctx).await?;
    authz::require_admin(role, &ctx.request_id)?;

    validate_nurse(&req, &ctx.request_id)?;

    let nurse = state
        .db()
        .nurses()
        .create(req)
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?;

    Ok((StatusCode::CREATED, Json(nurse)))
}

/// GET /v1/nurses/{nurse_id}
async fn get_nurse(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(nurse_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    authz::require_staff(&state, &ctx).await?;

    let nurse = state
        .db()
        .nurses()
        .get(NurseId::new(nurse_id))
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?
        .ok_or_else(|| {
            ApiError::not_found("not_found", format!("nurse {nurse_id} not found"))
                .with_request_id(ctx.request_id.clone())
        })?;

    Ok(Json(nurse))
}

/// PUT /v1/nurses/{nurse_id}
async fn update_nurse(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(nurse_id): Path<i64>,
    Json(req): Json<UpdateNurse>,
) -> Result<impl IntoResponse, ApiError> {
    let role = authz::require_staff(&state, &ctx).await?;
    authz::require_admin(role, &ctx.request_id)?;

    validate_nurse(&req, &ctx.request_id)?;

    let nurse = state
        .db()
        .nurses()
        .update(NurseId::new(nurse_id), req)
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?;

    Ok(Json(nurse))
}

/// DELETE /v1/nurses/{nurse_id}
async fn delete_nurse(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(nurse_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let role = authz::require_staff(&state, &ctx).await?;
    authz::require_admin(role, &ctx.request_id)?;

    state
        .db()
        .nurses()
        .delete(NurseId::new(nurse_id))
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?;

    Ok(StatusCode::NO_CONTENT)
}
