//! Lab API endpoints: tests, categories and lab staff.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use carelane_id::{LabStaffId, LabTestCategoryId, LabTestId, NumberKind, PatientId, RecordNumber};

use crate::api::authz;
use crate::api::error::{ApiError, FieldError};
use crate::api::request_context::RequestContext;
use crate::db::{
    CreateLabStaff, CreateLabTest, CreateLabTestCategory, UpdateLabStaff, UpdateLabTest,
    UpdateLabTestCategory,
};
use crate::state::AppState;

use super::ListResponse;

/// Create lab test routes.
pub fn test_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tests).post(create_test))
        .route(
            "/{lab_test_id}",
            get(get_test).put(update_test).delete(delete_test),
        )
}

/// Create lab test category routes.
pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route(
            "/{category_id}",
            get(get_category).put(update_category).delete(delete_category),
        )
}

/// Create lab staff routes.
pub fn staff_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_staff).post(create_staff))
        .route(
            "/{lab_staff_id}",
            get(get_staff).put(update_staff).delete(delete_staff),
        )
}

/// Query filters for listing lab tests.
#[derive(Debug, Deserialize)]
struct ListTestsQuery {
    patient_id: Option<i64>,
}

// =============================================================================
// Lab tests
// =============================================================================

/// GET /v1/lab-tests
async fn list_tests(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<ListTestsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    authz::require_staff(&state, &ctx).await?;

    let tests = state
        .db()
        .lab()
        .list_tests(query.patient_id.map(PatientId::new))
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?;

    Ok(Json(ListResponse::new(tests)))
}

/// POST /v1/lab-tests
async fn create_test(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<CreateLabTest>,
) -> Result<impl IntoResponse, ApiError> {
    let role = authz::require_staff(&state, &ctx).await?;
    authz::require_lab_write(role, &ctx.request_id)?;

    if let Some(number) = &req.test_number {
        RecordNumber::parse_as(NumberKind::LabTest, number).map_err(|e| {
            ApiError::bad_request("invalid_test_number", e.to_string())
                .with_request_id(ctx.request_id.clone())
        })?;
    }
    if req.test_name.trim().is_empty() {
        return Err(
            ApiError::bad_request("invalid_lab_test", "test name cannot be empty")
                .with_details(vec![FieldError {
                    field: "test_name".to_string(),
                    message: "test name cannot be empty".to_string(),
                }])
                .with_request_id(ctx.request_id.clone()),
        );
    }

    let test = state
        .db()
        .lab()
        .create_test(req)
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?;

    Ok((StatusCode::CREATED, Json(test)))
}

/// GET /v1/lab-tests/{lab_test_id}
async fn get_test(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(lab_test_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    authz::require_staff(&state, &ctx).await?;

    let test = state
        .db()
        .lab()
        .get_test(LabTestId::new(lab_test_id))
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?
        .ok_or_else(|| {
            ApiError::not_found("not_found", format!("lab test {lab_test_id} not found"))
                .with_request_id(ctx.request_id.clone())
        })?;

    Ok(Json(test))
}

/// PUT /v1/lab-tests/{lab_test_id}
async fn update_test(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(lab_test_id): Path<i64>,
    Json(req): Json<UpdateLabTest>,
) -> Result<impl IntoResponse, ApiError> {
    let role = authz::require_staff(&state, &ctx).await?;
    authz::require_lab_write(role, &ctx.request_id)?;

    let test = state
        .db()
        .lab()
        .update_test(LabTestId::new(lab_test_id), req)
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?;

    Ok(Json(test))
}

/// DELETE /v1/lab-tests/{lab_test_id}
async fn delete_test(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(lab_test_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let role = authz::require_staff(&state, &ctx).await?;
    authz::require_lab_write(role, &ctx.request_id)?;

    state
        .db()
        .lab()
        .delete_test(LabTestId::new(lab_test_id))
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?;

    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Categories
// =============================================================================

/// GET /v1/lab-test-categories
async fn list_categories(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<impl IntoResponse, ApiError> {
    authz::require_staff(&state, &ctx).await?;

    let categories = state
        .db()
        .lab()
        .list_categories()
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?;

    Ok(Json(ListResponse::new(categories)))
}

/// POST /v1/lab-test-categories
async fn create_category(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<CreateLabTestCategory>,
) -> Result<impl IntoResponse, ApiError> {
    let role = authz::require_staff(&state, &ctx).await?;
    authz::require_lab_write(role, &ctx.request_id)?;

    if req.name.trim().is_empty() {
        return Err(
            ApiError::bad_request("invalid_category", "category name cannot be empty")
                .with_request_id(ctx.request_id.clone()),
        );
    }

    let category = state
        .db()
        .lab()
        .create_category(req)
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?;

    Ok((StatusCode::CREATED, Json(category)))
}

/// GET /v1/lab-test-categories/{category_id}
async fn get_category(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(category_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    authz::require_staff(&state, &ctx).await?;

    let category = state
        .db()
        .lab()
        .get_category(LabTestCategoryId::new(category_id))
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?
        .ok_or_else(|| {
            ApiError::not_found("not_found", format!("category {category_id} not found"))
                .with_request_id(ctx.request_id.clone())
        })?;

    Ok(Json(category))
}

/// PUT /v1/lab-test-categories/{category_id}
async fn update_category(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(category_id): Path<i64>,
    Json(req): Json<UpdateLabTestCategory>,
) -> Result<impl IntoResponse, ApiError> {
    let role = authz::require_staff(&state, &ctx).await?;
    authz::require_lab_write(role, &ctx.request_id)?;

    if req.name.trim().is_empty() {
        return Err(
            ApiError::bad_request("invalid_category", "category name cannot be empty")
                .with_request_id(ctx.request_id.clone()),
        );
    }

    let category = state
        .db()
        .lab()
        .update_category(LabTestCategoryId::new(category_id), req)
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?;

    Ok(Json(category))
}

/// DELETE /v1/lab-test-categories/{category_id}
async fn delete_category(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(category_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let role = authz::require_staff(&state, &ctx).await?;
    authz::require_lab_write(role, &ctx.request_id)?;

    state
        .db()
        .lab()
        .delete_category(LabTestCategoryId::new(category_id))
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?;

    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Lab staff
// =============================================================================

/// GET /v1/lab-staff
async fn list_staff(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<impl IntoResponse, ApiError> {
    authz::require_staff(&state, &ctx).await?;

    let staff = state
        .db()
        .lab()
        .list_staff()
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?;

    Ok(Json(ListResponse::new(staff)))
}

/// POST /v1/lab-staff
async fn create_staff(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<CreateLabStaff>,
) -> Result<impl IntoResponse, ApiError> {
    let role = authz::require_staff(&state, &ctx).await?;
    authz::require_admin(role, &ctx.request_id)?;

    if req.first_name.trim().is_empty() || req.last_name.trim().is_empty() {
        return Err(
            ApiError::bad_request("invalid_lab_staff", "first and last name cannot be empty")
                .with_request_id(ctx.request_id.clone()),
        );
    }

    let staff = state
        .db()
        .lab()
        .create_staff(req)
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?;

    Ok((StatusCode::CREATED, Json(staff)))
}

/// GET /v1/lab-staff/{lab_staff_id}
async fn get_staff(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(lab_staff_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    authz::require_staff(&state, &ctx).await?;

    let staff = state
        .db()
        .lab()
        .get_staff(LabStaffId::new(lab_staff_id))
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?
        .ok_or_else(|| {
            ApiError::not_found("not_found", format!("lab staff {lab_staff_id} not found"))
                .with_request_id(ctx.request_id.clone())
        })?;

    Ok(Json(staff))
}

/// PUT /v1/lab-staff/{lab_staff_id}
async fn update_staff(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(lab_staff_id): Path<i64>,
    Json(req): Json<UpdateLabStaff>,
) -> Result<impl IntoResponse, ApiError> {
    let role = authz::require_staff(&state, &ctx).await?;
    authz::require_admin(role, &ctx.request_id)?;

    let staff = state
        .db()
        .lab()
        .update_staff(LabStaffId::new(lab_staff_id), req)
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?;

    Ok(Json(staff))
}

/// DELETE /v1/lab-staff/{lab_staff_id}
async fn delete_staff(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(lab_staff_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let role = authz::require_staff(&state, &ctx).await?;
    authz::require_admin(role, &ctx.request_id)?;

    state
        .db()
        .lab()
        .delete_staff(LabStaffId::new(lab_staff_id))
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?;

    Ok(StatusCode::NO_CONTENT)
}
