//! Doctor API endpoints, including weekly schedule management.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use carelane_id::DoctorId;

use crate::api::authz;
use crate::api::error::{ApiError, FieldError};
use crate::api::request_context::RequestContext;
use crate::db::{CreateDoctor, DoctorScheduleEntry, UpdateDoctor};
use crate::state::AppState;

use super::ListResponse;

/// Create doctor routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_doctors).post(create_doctor))
        .route(
            "/{doctor_id}",
            get(get_doctor).put(update_doctor).delete(delete_doctor),
        )
        .route(
            "/{doctor_id}/schedules",
            get(get_schedules).put(replace_schedules),
        )
        .route("/{doctor_id}/statistics", get(get_statistics))
}

/// Query filters for listing doctors.
#[derive(Debug, Deserialize)]
struct ListDoctorsQuery {
    specialization: Option<String>,
}

fn validate_doctor(req: &CreateDoctor, request_id: &str) -> Result<(), ApiError> {
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
    if req.specialization.trim().is_empty() {
        details.push(FieldError {
            field: "specialization".to_string(),
            message: "specialization cannot be empty".to_string(),
        });
    }
    if req.consultation_fee_cents < 0 {
        details.push(FieldError {
            field: "consultation_fee_cents".to_string(),
            message: "consultation fee cannot be negative".to_string(),
        });
    }

    if details.is_empty() {
        Ok(())
    } else {
        Err(ApiError::bad_request("invalid_doctor", "Invalid doctor fields")
            .with_details(details)
            .with_request_id(request_id.to_string()))
    }
}

/// GET /v1/doctors
async fn list_doctors(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<ListDoctorsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    authz::require_staff(&state, &ctx).await?;

    let doctors = state
        .db()
        .doctors()
        .list(query.specialization.as_deref())
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?;

    Ok(Json(ListResponse::new(doctors)))
}

/// POST /v1/doctors
async fn create_doctor(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<CreateDoctor>,
) -> Result<impl IntoResponse, ApiError> {
    let role = authz::require_staff(&state, &ctx).await?;
    authz::require_admin(role, &ctx.request_id)?;

    validate_doctor(&req, &ctx.request_id)?;

    let doctor = state
        .db()
        .doctors()
        .create(req)
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?;

    Ok((StatusCode::CREATED, Json(doctor)))
}

/// GET /v1/doctors/{doctor_id}
async fn get_doctor(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(doctor_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    authz::require_staff(&state, &ctx).await?;

    let doctor = state
        .db()
        .doctors()
        .get(DoctorId::new(doctor_id))
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?
        .ok_or_else(|| {
            ApiError::not_found("not_found", format!("doctor {doctor_id} not found"))
                .with_request_id(ctx.request_id.clone())
        })?;

    Ok(Json(doctor))
}

/// PUT /v1/doctors/{doctor_id}
async fn update_doctor(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(doctor_id): Path<i64>,
    Json(req): Json<UpdateDoctor>,
) -> Result<impl IntoResponse, ApiError> {
    let role = authz::require_staff(&state, &ctx).await?;
    authz::require_admin(role, &ctx.request_id)?;

    validate_doctor(&req, &ctx.request_id)?;

    let doctor = state
        .db()
        .doctors()
        .update(DoctorId::new(doctor_id), req)
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?;

    Ok(Json(doctor))
}

/// DELETE /v1/doctors/{doctor_id}
async fn delete_doctor(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(doctor_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let role = authz::require_staff(&state, &ctx).await?;
    authz::require_admin(role, &ctx.request_id)?;

    state
        .db()
        .doctors()
        .delete(DoctorId::new(doctor_id))
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /v1/doctors/{doctor_id}/statistics
async fn get_statistics(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(doctor_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    authz::require_staff(&state, &ctx).await?;

    let statistics = state
        .db()
        .doctors()
        .statistics(DoctorId::new(doctor_id))
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?;

    Ok(Json(statistics))
}

/// GET /v1/doctors/{doctor_id}/schedules
async fn get_schedules(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(doctor_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    authz::require_staff(&state, &ctx).await?;

    let schedules = state
        .db()
        .doctors()
        .schedules(DoctorId::new(doctor_id))
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?;

    Ok(Json(ListResponse::new(schedules)))
}

/// PUT /v1/doctors/{doctor_id}/schedules
///
/// Replaces the doctor's whole weekly schedule in one transaction.
async fn replace_schedules(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(doctor_id): Path<i64>,
    Json(entries): Json<Vec<DoctorScheduleEntry>>,
) -> Result<impl IntoResponse, ApiError> {
    let role = authz::require_staff(&state, &ctx).await?;
    authz::require_admin(role, &ctx.request_id)?;

    let mut details = Vec::new();
    for (i, entry) in entries.iter().enumerate() {
        if !(0..=6).contains(&entry.day_of_week) {
            details.push(FieldError {
                field: format!("[{i}].day_of_week"),
                message: "day_of_week must be between 0 (Sunday) and 6 (Saturday)".to_string(),
            });
        }
        if entry.end_time <= entry.start_time {
            details.push(FieldError {
                field: format!("[{i}].end_time"),
                message: "end_time must be after start_time".to_string(),
            });
        }
    }
    if !details.is_empty() {
        return Err(
            ApiError::bad_request("invalid_schedule", "Invalid schedule entries")
                .with_details(details)
                .with_request_id(ctx.request_id.clone()),
        );
    }

    let schedules = state
        .db()
        .doctors()
        .replace_schedules(DoctorId::new(doctor_id), entries)
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?;

    Ok(Json(ListResponse::new(schedules)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_doctor() -> CreateDoctor {
        CreateDoctor {
            first_name: "Asha".to_string(),
            last_name: "Rao".to_string(),
            specialization: "Cardiology".to_string(),
            email: String::new(),
            phone: String::new(),
            address: String::new(),
            qualification: String::new(),
            license_number: String::new(),
            date_of_birth: None,
            gender: "female".to_string(),
            consultation_fee_cents: 50_00,
            status: "active".to_string(),
        }
    }

    #[test]
    fn valid_doctor_passes() {
        assert!(validate_doctor(&sample_doctor(), "req").is_ok());
    }

    #[test]
    fn negative_fee_is_rejected() {
        let mut req = sample_doctor();
        req.consultation_fee_cents = -1;
        let err = validate_doctor(&req, "req").unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
