//! Patient API endpoints.
//!
//! Patients are the root entity: every clinical and billing record hangs off
//! a patient row, and each patient carries a unique MR number.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use carelane_id::{NumberKind, PatientId, RecordNumber};

use crate::api::authz;
use crate::api::error::{ApiError, FieldError};
use crate::api::request_context::RequestContext;
use crate::db::{CreatePatient, UpdatePatient};
use crate::state::AppState;

use super::ListResponse;

/// Create patient routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_patients).post(create_patient))
        .route(
            "/{patient_id}",
            get(get_patient).put(update_patient).delete(delete_patient),
        )
        .route("/{patient_id}/detail", get(get_patient_detail))
        .route("/mr/{mr_number}", get(get_patient_by_mr))
}

fn validate_patient_fields(
    first_name: &str,
    last_name: &str,
    gender: &str,
    request_id: &str,
) -> Result<(), ApiError> {
    let mut details = Vec::new();
    if first_name.trim().is_empty() {
        details.push(FieldError {
            field: "first_name".to_string(),
            message: "first name cannot be empty".to_string(),
        });
    }
    if first_name.len() > 100 {
        details.push(FieldError {
            field: "first_name".to_string(),
            message: "first name cannot exceed 100 characters".to_string(),
        });
    }
    if last_name.trim().is_empty() {
        details.push(FieldError {
            field: "last_name".to_string(),
            message: "last name cannot be empty".to_string(),
        });
    }
    if last_name.len() > 100 {
        details.push(FieldError {
            field: "last_name".to_string(),
            message: "last name cannot exceed 100 characters".to_string(),
        });
    }
    if gender.trim().is_empty() {
        details.push(FieldError {
            field: "gender".to_string(),
            message: "gender cannot be empty".to_string(),
        });
    }

    if details.is_empty() {
        Ok(())
    } else {
        Err(ApiError::bad_request("invalid_patient", "Invalid patient fields")
            .with_details(details)
            .with_request_id(request_id.to_string()))
    }
}

/// GET /v1/patients
async fn list_patients(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<impl IntoResponse, ApiError> {
    authz::require_staff(&state, &ctx).await?;

    let patients = state
        .db()
        .patients()
        .list()
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?;

    Ok(Json(ListResponse::new(patients)))
}

/// POST /v1/patients
async fn create_patient(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<CreatePatient>,
) -> Result<impl IntoResponse, ApiError> {
    let role = authz::require_staff(&state, &ctx).await?;
    authz::require_clinical_write(role, &ctx.request_id)?;

    validate_patient_fields(&req.first_name, &req.last_name, &req.gender, &ctx.request_id)?;

    if let Some(mr_number) = &req.mr_number {
        RecordNumber::parse_as(NumberKind::MedicalRecord, mr_number).map_err(|e| {
            ApiError::bad_request("invalid_mr_number", e.to_string())
                .with_request_id(ctx.request_id.clone())
        })?;
    }

    let patient = state
        .db()
        .patients()
        .create(req)
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?;

    Ok((StatusCode::CREATED, Json(patient)))
}

/// GET /v1/patients/{patient_id}
async fn get_patient(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(patient_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    authz::require_staff(&state, &ctx).await?;

    let patient = state
        .db()
        .patients()
        .get(PatientId::new(patient_id))
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?
        .ok_or_else(|| {
            ApiError::not_found("not_found", format!("patient {patient_id} not found"))
                .with_request_id(ctx.request_id.clone())
        })?;

    Ok(Json(patient))
}

/// GET /v1/patients/{patient_id}/detail
///
/// The patient row plus every clinical and billing record attached to it.
async fn get_patient_detail(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(patient_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    authz::require_staff(&state, &ctx).await?;

    let detail = state
        .db()
        .patients()
        .detail(PatientId::new(patient_id))
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?
        .ok_or_else(|| {
            ApiError::not_found("not_found", format!("patient {patient_id} not found"))
                .with_request_id(ctx.request_id.clone())
        })?;

    Ok(Json(detail))
}

/// GET /v1/patients/mr/{mr_number}
async fn get_patient_by_mr(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(mr_number): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    authz::require_staff(&state, &ctx).await?;

    let patient = state
        .db()
        .patients()
        .find_by_mr_number(&mr_number)
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?
        .ok_or_else(|| {
            ApiError::not_found("not_found", format!("patient {mr_number} not found"))
                .with_request_id(ctx.request_id.clone())
        })?;

    Ok(Json(patient))
}

/// PUT /v1/patients/{patient_id}
async fn update_patient(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(patient_id): Path<i64>,
    Json(req): Json<UpdatePatient>,
) -> Result<impl IntoResponse, ApiError> {
    let role = authz::require_staff(&state, &ctx).await?;
    authz::require_clinical_write(role, &ctx.request_id)?;

    validate_patient_fields(&req.first_name, &req.last_name, &req.gender, &ctx.request_id)?;

    let patient = state
        .db()
        .patients()
        .update(PatientId::new(patient_id), req)
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?;

    Ok(Json(patient))
}

/// DELETE /v1/patients/{patient_id}
///
/// Refused while the patient still has active dependent records.
async fn delete_patient(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(patient_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let role = authz::require_staff(&state, &ctx).await?;
    authz::require_admin(role, &ctx.request_id)?;

    state
        .db()
        .patients()
        .delete(PatientId::new(patient_id))
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_names_are_rejected() {
        let err = validate_patient_fields("", "Smith", "female", "req").unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        let details = err.problem.details.as_ref().unwrap();
        assert!(details.iter().any(|d| d.field == "first_name"));
    }

    #[test]
    fn complete_fields_pass_validation() {
        assert!(validate_patient_fields("Jane", "Smith", "female", "req").is_ok());
    }

    #[test]
    fn create_patient_request_deserializes_without_mr_number() {
        let json = r#"{
            "first_name": "Jane", "last_name": "Smith", "email": "", "phone": "",
            "alternate_phone": "", "gender": "female", "address": "", "city": "",
            "state": "", "zip_code": "", "blood_group": "", "emergency_contact_name": "",
            "emergency_contact_phone": "", "medical_history": "", "allergies": ""
        }"#;
        let req: CreatePatient = serde_json::from_str(json).unwrap();
        assert!(req.mr_number.is_none());
        assert_eq!(req.first_name, "Jane");
    }
}
