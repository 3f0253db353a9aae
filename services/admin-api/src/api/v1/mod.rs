//! API v1 routes.

mod appointments;
mod dashboard;
mod doctors;
mod lab;
mod nurses;
mod patients;
mod prescriptions;
mod procedures;
mod transactions;

use axum::Router;
use serde::Serialize;

use crate::state::AppState;

/// Envelope for list endpoints.
#[derive(Debug, Serialize)]
pub(crate) struct ListResponse<T> {
    pub items: Vec<T>,
    pub total: i64,
}

impl<T> ListResponse<T> {
    pub(crate) fn new(items: Vec<T>) -> Self {
        let total = items.len() as i64;
        Self { items, total }
    }
}

/// Create API v1 routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/patients", patients::routes())
        .nest("/doctors", doctors::routes())
        .nest("/nurses", nurses::routes())
        .nest("/appointments", appointments::routes())
        .nest("/procedures", procedures::routes())
        .nest("/lab-tests", lab::test_routes())
        .nest("/lab-test-categories", lab::category_routes())
        .nest("/lab-staff", lab::staff_routes())
        .nest("/prescriptions", prescriptions::routes())
        .nest("/transactions", transactions::routes())
        .nest("/dashboard", dashboard::routes())
}
