//! Appointment API endpoints.
//!
//! Appointments can be listed by date, patient or doctor, and carry SMS and
//! WhatsApp notification flags set through a dedicated sub-resource.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;

use carelane_id::{AppointmentId, DoctorId, NumberKind, PatientId, RecordNumber};

use crate::api::authz;
use crate::api::error::ApiError;
use crate::api::request_context::RequestContext;
use crate::db::{CreateAppointment, NotificationChannel, UpdateAppointment};
use crate::state::AppState;

use super::ListResponse;

/// Create appointment routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_appointments).post(create_appointment))
        .route(
            "/{appointment_id}",
            get(get_appointment)
                .put(update_appointment)
                .delete(delete_appointment),
        )
        .route("/{appointment_id}/notifications", post(mark_notification))
}

/// Query filters for listing appointments.
#[derive(Debug, Deserialize)]
struct ListAppointmentsQuery {
    date: Option<NaiveDate>,
    patient_id: Option<i64>,
    doctor_id: Option<i64>,
}

/// Body for POST /{appointment_id}/notifications.
#[derive(Debug, Deserialize)]
struct MarkNotificationRequest {
    channel: NotificationChannel,
}

/// GET /v1/appointments
async fn list_appointments(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<ListAppointmentsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    authz::require_staff(&state, &ctx).await?;

    let appointments = state
        .db()
        .appointments()
        .list(
            query.date,
            query.patient_id.map(PatientId::new),
            query.doctor_id.map(DoctorId::new),
        )
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?;

    Ok(Json(ListResponse::new(appointments)))
}

/// POST /v1/appointments
async fn create_appointment(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<CreateAppointment>,
) -> Result<impl IntoResponse, ApiError> {
    let role = authz::require_staff(&state, &ctx).await?;
    authz::require_clinical_write(role, &ctx.request_id)?;

    if let Some(number) = &req.appointment_number {
        RecordNumber::parse_as(NumberKind::Appointment, number).map_err(|e| {
            ApiError::bad_request("invalid_appointment_number", e.to_string())
                .with_request_id(ctx.request_id.clone())
        })?;
    }

    let appointment = state
        .db()
        .appointments()
        .create(req)
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?;

    Ok((StatusCode::CREATED, Json(appointment)))
}

/// GET /v1/appointments/{appointment_id}
async fn get_appointment(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(appointment_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    authz::require_staff(&state, &ctx).await?;

    let appointment = state
        .db()
        .appointments()
        .get(AppointmentId::new(appointment_id))
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?
        .ok_or_else(|| {
            ApiError::not_found(
                "not_found",
                format!("appointment {appointment_id} not found"),
            )
            .with_request_id(ctx.request_id.clone())
        })?;

    Ok(Json(appointment))
}

/// PUT /v1/appointments/{appointment_id}
async fn update_appointment(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(appointment_id): Path<i64>,
    Json(req): Json<UpdateAppointment>,
) -> Result<impl IntoResponse, ApiError> {
    let role = authz::require_staff(&state, &ctx).await?;
    authz::require_clinical_write(role, &ctx.request_id)?;

    let appointment = state
        .db()
        .appointments()
        .update(AppointmentId::new(appointment_id), req)
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?;

    Ok(Json(appointment))
}

/// DELETE /v1/appointments/{appointment_id}
async fn delete_appointment(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(appointment_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let role = authz::require_staff(&state, &ctx).await?;
    authz::require_clinical_write(role, &ctx.request_id)?;

    state
        .db()
        .appointments()
        .delete(AppointmentId::new(appointment_id))
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/appointments/{appointment_id}/notifications
///
/// Records that a reminder went out on the given channel.
async fn mark_notification(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(appointment_id): Path<i64>,
    Json(req): Json<MarkNotificationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let role = authz::require_staff(&state, &ctx).await?;
    authz::require_clinical_write(role, &ctx.request_id)?;

    let appointment = state
        .db()
        .appointments()
        .mark_notification(AppointmentId::new(appointment_id), req.channel)
        .await
        .map_err(|e| ApiError::from_db(e, &ctx.request_id))?;

    Ok(Json(appointment))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_request_deserializes_channel() {
        let req: MarkNotificationRequest =
            serde_json::from_str(r#"{"channel": "whatsapp"}"#).unwrap();
        assert_eq!(req.channel, NotificationChannel::Whatsapp);
    }

    #[test]
    fn unknown_channel_is_rejected() {
        assert!(serde_json::from_str::<MarkNotificationRequest>(r#"{"channel": "fax"}"#).is_err());
    }
}
