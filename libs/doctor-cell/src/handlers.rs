use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_database::ClinicState;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::require_role;

use crate::models::{
    CreateDoctorRequest, DoctorError, DoctorFilter, DoctorProfile, LoginRequest, TimeOfDay,
    UpdateDoctorRequest,
};
use crate::services::{AvailabilityService, DoctorFilterService, DoctorService};

#[derive(Debug, Deserialize)]
pub struct FilterQuery {
    pub name: Option<String>,
    pub specialty: Option<String>,
    pub time: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub date: Option<String>,
}

fn parse_doctor_id(raw: &str) -> Result<Uuid, DoctorError> {
    Uuid::parse_str(raw)
        .map_err(|_| DoctorError::ValidationError(format!("Invalid doctor id: {}", raw)))
}

fn parse_date(raw: Option<&str>) -> Result<Option<NaiveDate>, DoctorError> {
    raw.filter(|value| !value.trim().is_empty())
        .map(|value| {
            NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
                DoctorError::ValidationError(format!("Invalid date '{}', expected YYYY-MM-DD", value))
            })
        })
        .transpose()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_doctors(State(state): State<ClinicState>) -> Result<Json<Value>, AppError> {
    let doctors: Vec<DoctorProfile> = DoctorService::new(&state)
        .list()
        .await?
        .into_iter()
        .map(DoctorProfile::from)
        .collect();

    Ok(Json(json!({
        "doctors": doctors,
        "total": doctors.len()
    })))
}

#[axum::debug_handler]
pub async fn filter_doctors(
    State(state): State<ClinicState>,
    Query(query): Query<FilterQuery>,
) -> Result<Json<Value>, AppError> {
    let filter = DoctorFilter {
        name: non_empty(query.name),
        specialty: non_empty(query.specialty),
        time_of_day: non_empty(query.time)
            .map(|raw| raw.parse::<TimeOfDay>())
            .transpose()?,
        date: parse_date(query.date.as_deref())?,
    };

    let doctors: Vec<DoctorProfile> = DoctorFilterService::new(&state)
        .filter(&filter)
        .await?
        .into_iter()
        .map(DoctorProfile::from)
        .collect();

    Ok(Json(json!({
        "doctors": doctors,
        "total": doctors.len()
    })))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<ClinicState>,
    Path(doctor_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = parse_doctor_id(&doctor_id)?;
    let doctor = DoctorService::new(&state).get(doctor_id).await?;

    Ok(Json(json!(DoctorProfile::from(doctor))))
}

#[axum::debug_handler]
pub async fn get_doctor_availability(
    State(state): State<ClinicState>,
    Path(doctor_id): Path<String>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = parse_doctor_id(&doctor_id)?;
    let date = parse_date(query.date.as_deref())?.unwrap_or_else(|| Utc::now().date_naive());

    let availability = AvailabilityService::new(&state)
        .availability(doctor_id, date)
        .await?;

    Ok(Json(json!({
        "doctor_id": availability.doctor_id,
        "date": availability.date,
        "slots": availability.slots,
        "free_slots": availability.free_count(),
        "booked_slots": availability.booked_count()
    })))
}

#[axum::debug_handler]
pub async fn login_doctor(
    State(state): State<ClinicState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<Value>, AppError> {
    let doctor = DoctorService::new(&state)
        .authenticate(&request.email, &request.password)
        .await?;

    Ok(Json(json!({
        "doctor": DoctorProfile::from(doctor)
    })))
}

// ==============================================================================
// ADMIN HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_doctor(
    State(state): State<ClinicState>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateDoctorRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    require_role(&user, &["admin"])?;

    let doctor = DoctorService::new(&state).register(request).await?;

    Ok((StatusCode::CREATED, Json(json!(DoctorProfile::from(doctor)))))
}

#[axum::debug_handler]
pub async fn update_doctor(
    State(state): State<ClinicState>,
    Path(doctor_id): Path<String>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &["admin"])?;
    let doctor_id = parse_doctor_id(&doctor_id)?;

    let doctor = DoctorService::new(&state).update(doctor_id, request).await?;

    Ok(Json(json!(DoctorProfile::from(doctor))))
}

#[axum::debug_handler]
pub async fn delete_doctor(
    State(state): State<ClinicState>,
    Path(doctor_id): Path<String>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &["admin"])?;
    let doctor_id = parse_doctor_id(&doctor_id)?;

    let removed = DoctorService::new(&state).delete(doctor_id).await?;

    Ok(Json(json!({
        "deleted": doctor_id,
        "appointments_removed": removed
    })))
}
