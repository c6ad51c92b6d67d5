use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_database::ClinicState;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn appointment_routes(clinic: ClinicState) -> Router {
    let config = clinic.config.clone();

    // All appointment operations require authentication
    let protected_routes = Router::new()
        .route("/", post(handlers::book_appointment))
        .route(
            "/{appointment_id}",
            get(handlers::get_appointment).put(handlers::update_appointment),
        )
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/{appointment_id}/complete", post(handlers::complete_appointment))
        .route("/patients/{patient_id}", get(handlers::get_patient_appointments))
        .route("/doctors/{doctor_id}", get(handlers::get_doctor_schedule))
        .layer(middleware::from_fn_with_state(config, auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(clinic)
}
