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
use shared_models::scheduling::Appointment;
use shared_utils::extractor::{require_role, user_uuid};

use crate::models::{
    AppointmentError, BookAppointmentRequest, HistoryCondition, UpdateAppointmentRequest,
};
use crate::services::{AppointmentBookingService, AppointmentHistoryService};

#[derive(Debug, Deserialize)]
pub struct PatientAppointmentsQuery {
    pub doctor_name: Option<String>,
    pub condition: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DoctorScheduleQuery {
    pub date: Option<String>,
    pub patient: Option<String>,
}

fn parse_id(raw: &str) -> Result<Uuid, AppointmentError> {
    Uuid::parse_str(raw)
        .map_err(|_| AppointmentError::ValidationError(format!("Invalid id: {}", raw)))
}

fn is_principal(user: &User, id: Uuid) -> bool {
    Uuid::parse_str(&user.id).is_ok_and(|user_id| user_id == id)
}

fn can_view(user: &User, appointment: &Appointment) -> bool {
    user.is_admin()
        || is_principal(user, appointment.patient_id)
        || is_principal(user, appointment.doctor_id)
}

// ==============================================================================
// APPOINTMENT LIFECYCLE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<ClinicState>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    require_role(&user, &["patient"])?;
    let patient_id = user_uuid(&user)?;

    let appointment = AppointmentBookingService::new(&state)
        .book_appointment(request.doctor_id, patient_id, request.appointment_time)
        .await?;

    Ok((StatusCode::CREATED, Json(json!(appointment))))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<ClinicState>,
    Path(appointment_id): Path<String>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let appointment_id = parse_id(&appointment_id)?;
    let appointment = AppointmentBookingService::new(&state)
        .get_appointment(appointment_id)
        .await?;

    if !can_view(&user, &appointment) {
        return Err(AppError::Forbidden(
            "Not authorized to view this appointment".to_string(),
        ));
    }

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<ClinicState>,
    Path(appointment_id): Path<String>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment_id = parse_id(&appointment_id)?;
    let service = AppointmentBookingService::new(&state);

    let current = service.get_appointment(appointment_id).await?;
    if !(user.is_admin() || is_principal(&user, current.patient_id)) {
        return Err(AppError::Forbidden(
            "Only the patient or an administrator can update this appointment".to_string(),
        ));
    }

    let appointment = service
        .update_appointment(appointment_id, request.appointment_time)
        .await?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<ClinicState>,
    Path(appointment_id): Path<String>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &["patient"])?;
    let appointment_id = parse_id(&appointment_id)?;
    let patient_id = user_uuid(&user)?;

    let appointment = AppointmentBookingService::new(&state)
        .cancel_appointment(appointment_id, patient_id)
        .await?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<ClinicState>,
    Path(appointment_id): Path<String>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let appointment_id = parse_id(&appointment_id)?;
    let service = AppointmentBookingService::new(&state);

    let current = service.get_appointment(appointment_id).await?;
    let is_treating_doctor = user.has_role("doctor") && is_principal(&user, current.doctor_id);
    if !(user.is_admin() || is_treating_doctor) {
        return Err(AppError::Forbidden(
            "Only the appointment's doctor or an administrator can complete it".to_string(),
        ));
    }

    let appointment = service.complete_appointment(appointment_id).await?;

    Ok(Json(json!(appointment)))
}

// ==============================================================================
// APPOINTMENT LISTINGS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_patient_appointments(
    State(state): State<ClinicState>,
    Path(patient_id): Path<String>,
    Query(query): Query<PatientAppointmentsQuery>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let patient_id = parse_id(&patient_id)?;

    if !is_principal(&user, patient_id) {
        require_role(&user, &["doctor", "admin"])?;
    }

    let condition = query
        .condition
        .as_deref()
        .filter(|raw| !raw.trim().is_empty())
        .map(str::parse::<HistoryCondition>)
        .transpose()?;
    let doctor_name = query
        .doctor_name
        .as_deref()
        .filter(|raw| !raw.trim().is_empty());

    let appointments = AppointmentHistoryService::new(&state)
        .patient_appointments(patient_id, doctor_name, condition)
        .await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len(),
        "patient_id": patient_id
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_schedule(
    State(state): State<ClinicState>,
    Path(doctor_id): Path<String>,
    Query(query): Query<DoctorScheduleQuery>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = parse_id(&doctor_id)?;

    let is_own_schedule = user.has_role("doctor") && is_principal(&user, doctor_id);
    if !(user.is_admin() || is_own_schedule) {
        return Err(AppError::Forbidden(
            "Only the doctor or an administrator can view this schedule".to_string(),
        ));
    }

    let date = match query.date.as_deref().filter(|raw| !raw.trim().is_empty()) {
        Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
            AppointmentError::ValidationError(format!("Invalid date: {}, expected YYYY-MM-DD", raw))
        })?,
        None => Utc::now().date_naive(),
    };
    let patient_id = query
        .patient
        .as_deref()
        .filter(|raw| !raw.trim().is_empty())
        .map(|raw| parse_id(raw.trim()))
        .transpose()?;

    let appointments = AppointmentHistoryService::new(&state)
        .doctor_schedule(doctor_id, date, patient_id)
        .await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len(),
        "doctor_id": doctor_id,
        "date": date
    })))
}
