use axum::{
    http::{header::CONTENT_TYPE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::db::DbError;

#[derive(Debug, Serialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub r#type: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    pub code: String,
    pub request_id: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
}

#[derive(Debug, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl ProblemDetails {
    fn new(status: StatusCode, code: impl Into<String>, detail: impl Into<String>) -> Self {
        let code = code.into();
        let title = status
            .canonical_reason()
            .unwrap_or("Unknown Error")
            .to_string();
        Self {
            r#type: format!("https://carelane.dev/problems/{code}"),
            title,
            status: status.as_u16(),
            detail: detail.into(),
            instance: None,
            code,
            request_id: "unknown".to_string(),
            retryable: false,
            details: None,
        }
    }

    fn set_request_id(&mut self, request_id: impl Into<String>) {
        let request_id = request_id.into();
        self.request_id = request_id.clone();
        if self.instance.is_none() {
            self.instance = Some(request_id);
        }
    }

    fn set_retryable(&mut self, retryable: bool) {
        self.retryable = retryable;
    }

    fn set_details(&mut self, details: Vec<FieldError>) {
        self.details = Some(details);
    }
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub problem: Box<ProblemDetails>,
}

impl ApiError {
    pub fn bad_request(code: impl Into<String>, message: impl Into<String>) -> Self {
        let status = StatusCode::BAD_REQUEST;
        let problem = Box::new(ProblemDetails::new(status, code, message));
        Self { status, problem }
    }

    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        let status = StatusCode::NOT_FOUND;
        let problem = Box::new(ProblemDetails::new(status, code, message));
        Self { status, problem }
    }

    pub fn internal(code: impl Into<String>, message: impl Into<String>) -> Self {
        let status = StatusCode::INTERNAL_SERVER_ERROR;
        let problem = Box::new(ProblemDetails::new(status, code, message));
        Self { status, problem }
    }

    pub fn conflict(code: impl Into<String>, message: impl Into<String>) -> Self {
        let status = StatusCode::CONFLICT;
        let problem = Box::new(ProblemDetails::new(status, code, message));
        Self { status, problem }
    }

    pub fn unauthorized(code: impl Into<String>, message: impl Into<String>) -> Self {
        let status = StatusCode::UNAUTHORIZED;
        let problem = Box::new(ProblemDetails::new(status, code, message));
        Self { status, problem }
    }

    pub fn forbidden(code: impl Into<String>, message: impl Into<String>) -> Self {
        let status = StatusCode::FORBIDDEN;
        let problem = Box::new(ProblemDetails::new(status, code, message));
        Self { status, problem }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.problem.set_request_id(request_id);
        self
    }

    pub fn with_details(mut self, details: Vec<FieldError>) -> Self {
        self.problem.set_details(details);
        self
    }

    pub fn retryable(mut self) -> Self {
        self.problem.set_retryable(true);
        self
    }

    /// Map a database error to its API representation.
    ///
    /// A unique violation on a record-number column means the caller lost the
    /// generation race after retries; it surfaces as a retryable conflict,
    /// never a silent overwrite.
    pub fn from_db(err: DbError, request_id: &str) -> Self {
        let api_error = match &err {
            DbError::NotFound { entity, id } => {
                Self::not_found("not_found", format!("{entity} {id} not found"))
            }
            DbError::UniqueViolation { constraint } => Self::conflict(
                "conflict",
                format!("a record with the same unique value already exists ({constraint})"),
            )
            .retryable(),
            DbError::RestrictedDelete {
                entity,
                id,
                dependents,
            } => Self::conflict(
                "restricted_delete",
                format!("{entity} {id} still has active {dependents}"),
            ),
            DbError::ForeignKeyViolation { constraint } => Self::bad_request(
                "invalid_reference",
                format!("a referenced record does not exist ({constraint})"),
            ),
            _ => {
                tracing::error!(error = %err, request_id = %request_id, "Database error");
                Self::internal("internal_error", "Storage operation failed")
            }
        };

        api_error.with_request_id(request_id.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.problem)).into_response();
        response.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_collision_maps_to_retryable_conflict() {
        let err = DbError::UniqueViolation {
            constraint: "patients_mr_number_key".to_string(),
        };
        let api = ApiError::from_db(err, "req-1");
        assert_eq!(api.status, StatusCode::CONFLICT);
        assert!(api.problem.retryable);
        assert_eq!(api.problem.request_id, "req-1");
    }

    #[test]
    fn restricted_delete_maps_to_conflict() {
        let err = DbError::RestrictedDelete {
            entity: "patient",
            id: 7,
            dependents: "clinical or billing records",
        };
        let api = ApiError::from_db(err, "req-2");
        assert_eq!(api.status, StatusCode::CONFLICT);
        assert!(!api.problem.retryable);
    }

    #[test]
    fn not_found_maps_to_404() {
        let err = DbError::NotFound {
            entity: "doctor",
            id: 3,
        };
        let api = ApiError::from_db(err, "req-3");
        assert_eq!(api.status, StatusCode::NOT_FOUND);
    }
}
