// libs/notification-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Extension, Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::{json_payload, path_param, query_params, require_staff};

use crate::models::{NewNotification, NotificationError, NotificationQuery};
use crate::services::NotificationService;

fn map_notification_error(e: NotificationError) -> AppError {
    match e {
        NotificationError::DuplicateNotification { .. } => AppError::Conflict {
            code: "duplicate_notification",
            message: e.to_string(),
        },
        NotificationError::NotFound => AppError::NotFound("Notification not found".to_string()),
        NotificationError::ValidationError(msg) => AppError::ValidationError(msg),
        NotificationError::DatabaseError(msg) => AppError::Database(msg),
    }
}

pub async fn create_notification(
    State(service): State<Arc<NotificationService>>,
    Extension(user): Extension<User>,
    request: Result<Json<NewNotification>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    require_staff(&user)?;
    let request = json_payload(request)?;

    let notification = service.create(request).await.map_err(map_notification_error)?;

    Ok((StatusCode::CREATED, Json(json!({
        "success": true,
        "notification": notification
    }))))
}

pub async fn list_notifications(
    State(service): State<Arc<NotificationService>>,
    Extension(user): Extension<User>,
    query: Result<Query<NotificationQuery>, QueryRejection>,
) -> Result<Json<Value>, AppError> {
    let mut query = query_params(query)?;
    // Patients only see notifications they caused.
    if !user.is_staff() {
        query.source_id = Some(user.id.clone());
    }

    let notifications = service.list(&query).await.map_err(map_notification_error)?;

    Ok(Json(json!({
        "notifications": notifications,
        "count": notifications.len()
    })))
}

pub async fn mark_notification_read(
    State(service): State<Arc<NotificationService>>,
    Extension(user): Extension<User>,
    notification_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Value>, AppError> {
    let notification_id = path_param(notification_id)?;
    require_staff(&user)?;

    let notification = service.mark_read(notification_id).await.map_err(map_notification_error)?;

    Ok(Json(json!({
        "success": true,
        "notification": notification
    })))
}

pub async fn delete_notification(
    State(service): State<Arc<NotificationService>>,
    Extension(user): Extension<User>,
    notification_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Value>, AppError> {
    let notification_id = path_param(notification_id)?;
    require_staff(&user)?;

    let notification = service.delete(notification_id).await.map_err(map_notification_error)?;

    Ok(Json(json!({
        "success": true,
        "notification": notification
    })))
}
