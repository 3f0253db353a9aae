//! Authorization helpers (v1).
//!
//! v1 maps the dev-stub bearer identity to a staff account row and gates
//! writes on the account's role.

use crate::api::error::ApiError;
use crate::api::request_context::RequestContext;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaffRole {
    Admin,
    Doctor,
    Nurse,
    Lab,
    Reception,
}

pub fn parse_staff_role(role: &str) -> Option<StaffRole> {
    match role {
        "admin" => Some(StaffRole::Admin),
        "doctor" => Some(StaffRole::Doctor),
        "nurse" => Some(StaffRole::Nurse),
        "lab" => Some(StaffRole::Lab),
        "reception" => Some(StaffRole::Reception),
        _ => None,
    }
}

pub fn staff_role_label(role: StaffRole) -> &'static str {
    match role {
        StaffRole::Admin => "admin",
        StaffRole::Doctor => "doctor",
        StaffRole::Nurse => "nurse",
        StaffRole::Lab => "lab",
        StaffRole::Reception => "reception",
    }
}

pub async fn require_staff(
    state: &AppState,
    ctx: &RequestContext,
) -> Result<StaffRole, ApiError> {
    let request_id = &ctx.request_id;
    let Some(email) = ctx.actor_email.as_deref() else {
        return Err(ApiError::unauthorized(
            "unauthorized",
            "Token subject email is required (use Bearer user:<email> in dev)",
        )
        .with_request_id(request_id.clone()));
    };

    let account = state
        .db()
        .staff_accounts()
        .find_by_email(email)
        .await
        .map_err(|e| {
            tracing::error!(
                error = %e,
                request_id = %request_id,
                email = %email,
                "Failed to load staff account"
            );
            ApiError::internal("internal_error", "Failed to authorize request")
                .with_request_id(request_id.clone())
        })?;

    let Some(account) = account else {
        return Err(
            ApiError::forbidden("forbidden", "No active staff account for this identity")
                .with_request_id(request_id.clone()),
        );
    };

    parse_staff_role(&account.role).ok_or_else(|| {
        ApiError::internal("internal_error", "Invalid staff role")
            .with_request_id(request_id.clone())
    })
}

/// Patient records, appointments, procedures and prescriptions.
pub fn require_clinical_write(role: StaffRole, request_id: &str) -> Result<(), ApiError> {
    match role {
        StaffRole::Admin | StaffRole::Doctor | StaffRole::Nurse | StaffRole::Reception => Ok(()),
        StaffRole::Lab => Err(ApiError::forbidden(
            "forbidden",
            "Insufficient permissions for clinical write operation",
        )
        .with_request_id(request_id.to_string())),
    }
}

/// Lab tests, categories and lab staff assignment.
pub fn require_lab_write(role: StaffRole, request_id: &str) -> Result<(), ApiError> {
    match role {
        StaffRole::Admin | StaffRole::Doctor | StaffRole::Lab => Ok(()),
        StaffRole::Nurse | StaffRole::Reception => Err(ApiError::forbidden(
            "forbidden",
            "Insufficient permissions for lab write operation",
        )
        .with_request_id(request_id.to_string())),
    }
}

/// Transactions and invoices.
pub fn require_billing_write(role: StaffRole, request_id: &str) -> Result<(), ApiError> {
    match role {
        StaffRole::Admin | StaffRole::Reception => Ok(()),
        StaffRole::Doctor | StaffRole::Nurse | StaffRole::Lab => Err(ApiError::forbidden(
            "forbidden",
            "Insufficient permissions for billing operation",
        )
        .with_request_id(request_id.to_string())),
    }
}

/// Staff rosters and doctor schedules.
pub fn require_admin(role: StaffRole, request_id: &str) -> Result<(), ApiError> {
    match role {
        StaffRole::Admin => Ok(()),
        _ => Err(ApiError::forbidden(
            "forbidden",
            "Admin role required for this operation",
        )
        .with_request_id(request_id.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(StaffRole::Admin)]
    #[case(StaffRole::Doctor)]
    #[case(StaffRole::Nurse)]
    #[case(StaffRole::Lab)]
    #[case(StaffRole::Reception)]
    fn role_labels_round_trip(#[case] role: StaffRole) {
        assert_eq!(parse_staff_role(staff_role_label(role)), Some(role));
    }

    #[test]
    fn unknown_role_does_not_parse() {
        assert_eq!(parse_staff_role("janitor"), None);
    }

    #[rstest]
    #[case(StaffRole::Admin, true)]
    #[case(StaffRole::Doctor, true)]
    #[case(StaffRole::Nurse, true)]
    #[case(StaffRole::Reception, true)]
    #[case(StaffRole::Lab, false)]
    fn clinical_write_access(#[case] role: StaffRole, #[case] allowed: bool) {
        assert_eq!(require_clinical_write(role, "req").is_ok(), allowed);
    }

    #[rstest]
    #[case(StaffRole::Admin, true)]
    #[case(StaffRole::Doctor, true)]
    #[case(StaffRole::Lab, true)]
    #[case(StaffRole::Nurse, false)]
    #[case(StaffRole::Reception, false)]
    fn lab_write_access(#[case] role: StaffRole, #[case] allowed: bool) {
        assert_eq!(require_lab_write(role, "req").is_ok(), allowed);
    }

    #[rstest]
    #[case(StaffRole::Admin, true)]
    #[case(StaffRole::Reception, true)]
    #[case(StaffRole::Doctor, false)]
    #[case(StaffRole::Nurse, false)]
    #[case(StaffRole::Lab, false)]
    fn billing_write_access(#[case] role: StaffRole, #[case] allowed: bool) {
        assert_eq!(require_billing_write(role, "req").is_ok(), allowed);
    }

    #[rstest]
    #[case(StaffRole::Admin, true)]
    #[case(StaffRole::Doctor, false)]
    fn admin_access(#[case] role: StaffRole, #[case] allowed: bool) {
        assert_eq!(require_admin(role, "req").is_ok(), allowed);
    }
}
