// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Extension, Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::{json_payload, path_param, query_params, require_staff};

use crate::models::{
    AppointmentError, AppointmentQuery, CreateAppointmentRequest, StatusUpdateRequest,
    UpdateAppointmentRequest,
};
use crate::services::booking::AppointmentBookingService;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct AvailableSlotsQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityCheckQuery {
    pub date: NaiveDate,
    pub time: String,
}

// ==============================================================================
// ERROR MAPPING
// ==============================================================================

fn map_appointment_error(e: AppointmentError) -> AppError {
    match e {
        AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
        AppointmentError::LeadTimeViolation { .. } => AppError::Rejected {
            code: "lead_time_violation",
            message: e.to_string(),
        },
        AppointmentError::DateBlocked { .. } => AppError::Rejected {
            code: "date_blocked",
            message: e.to_string(),
        },
        AppointmentError::InvalidStatusTransition { .. } => AppError::Rejected {
            code: "invalid_status_transition",
            message: e.to_string(),
        },
        AppointmentError::SlotConflict { .. } => AppError::Conflict {
            code: "slot_conflict",
            message: e.to_string(),
        },
        AppointmentError::DatabaseError(msg) => AppError::Database(msg),
    }
}

fn caller_uuid(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id).map_err(|_| AppError::BadRequest("Invalid user ID".to_string()))
}

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

pub async fn create_appointment(
    State(service): State<Arc<AppointmentBookingService>>,
    Extension(user): Extension<User>,
    request: Result<Json<CreateAppointmentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let mut request = json_payload(request)?;

    // Staff book on behalf of others; everyone else books for themselves.
    let create_notification = !user.is_staff();
    if create_notification {
        request.patient_id = Some(caller_uuid(&user)?);
    }

    let appointment = service
        .create_appointment(request, create_notification)
        .await
        .map_err(map_appointment_error)?;

    Ok((StatusCode::CREATED, Json(json!({
        "success": true,
        "appointment": appointment
    }))))
}

pub async fn list_appointments(
    State(service): State<Arc<AppointmentBookingService>>,
    Extension(user): Extension<User>,
    query: Result<Query<AppointmentQuery>, QueryRejection>,
) -> Result<Json<Value>, AppError> {
    let mut query = query_params(query)?;
    if !user.is_staff() {
        query.patient_id = Some(caller_uuid(&user)?);
    }

    let appointments = service.list_appointments(&query).await.map_err(map_appointment_error)?;

    Ok(Json(json!({
        "appointments": appointments,
        "count": appointments.len(),
        "skip": query.effective_skip(),
        "limit": query.effective_limit()
    })))
}

pub async fn get_available_slots(
    State(service): State<Arc<AppointmentBookingService>>,
    query: Result<Query<AvailableSlotsQuery>, QueryRejection>,
) -> Result<Json<Value>, AppError> {
    let query = query_params(query)?;
    let availability = service
        .get_available_slots(query.date)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(availability)))
}

pub async fn check_time_availability(
    State(service): State<Arc<AppointmentBookingService>>,
    query: Result<Query<AvailabilityCheckQuery>, QueryRejection>,
) -> Result<Json<Value>, AppError> {
    let query = query_params(query)?;
    let available = service
        .is_time_available(query.date, &query.time)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "date": query.date,
        "time": query.time,
        "available": available
    })))
}

pub async fn get_appointment(
    State(service): State<Arc<AppointmentBookingService>>,
    Extension(user): Extension<User>,
    appointment_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Value>, AppError> {
    let appointment_id = path_param(appointment_id)?;
    let appointment = service.get_appointment(appointment_id).await.map_err(map_appointment_error)?;

    let is_owner = appointment
        .patient_id
        .map(|id| id.to_string() == user.id)
        .unwrap_or(false);
    if !is_owner && !user.is_staff() {
        return Err(AppError::Forbidden("Not authorized to view this appointment".to_string()));
    }

    Ok(Json(json!(appointment)))
}

pub async fn update_appointment(
    State(service): State<Arc<AppointmentBookingService>>,
    Extension(user): Extension<User>,
    appointment_id: Result<Path<Uuid>, PathRejection>,
    request: Result<Json<UpdateAppointmentRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let appointment_id = path_param(appointment_id)?;
    require_staff(&user)?;
    let request = json_payload(request)?;

    let response = service
        .update_appointment(appointment_id, request, false)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": response.appointment,
        "sms_result": response.sms_result
    })))
}

pub async fn update_appointment_status(
    State(service): State<Arc<AppointmentBookingService>>,
    Extension(user): Extension<User>,
    appointment_id: Result<Path<Uuid>, PathRejection>,
    request: Result<Json<StatusUpdateRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let appointment_id = path_param(appointment_id)?;
    require_staff(&user)?;
    let request = json_payload(request)?;

    let response = service
        .update_status(appointment_id, request.status)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": response.appointment,
        "sms_result": response.sms_result
    })))
}

pub async fn delete_appointment(
    State(service): State<Arc<AppointmentBookingService>>,
    Extension(user): Extension<User>,
    appointment_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Value>, AppError> {
    let appointment_id = path_param(appointment_id)?;
    require_staff(&user)?;

    let appointment = service
        .delete_appointment(appointment_id)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}
