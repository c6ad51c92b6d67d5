use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_database::ClinicState;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn doctor_routes(state: ClinicState) -> Router {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/", get(handlers::list_doctors))
        .route("/filter", get(handlers::filter_doctors))
        .route("/login", post(handlers::login_doctor))
        .route("/{doctor_id}", get(handlers::get_doctor))
        .route("/{doctor_id}/availability", get(handlers::get_doctor_availability));

    // Admin routes (authentication required, role checked per handler)
    let protected_routes = Router::new()
        .route("/", post(handlers::create_doctor))
        .route(
            "/{doctor_id}",
            put(handlers::update_doctor).delete(handlers::delete_doctor),
        )
        .layer(middleware::from_fn_with_state(
            state.config.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
