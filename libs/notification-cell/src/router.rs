// libs/notification-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, patch},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::NotificationService;

pub fn notification_routes(config: Arc<AppConfig>, service: Arc<NotificationService>) -> Router {
    Router::new()
        .route("/", get(handlers::list_notifications).post(handlers::create_notification))
        .route("/{notification_id}/read", patch(handlers::mark_notification_read))
        .route("/{notification_id}", delete(handlers::delete_notification))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(service)
}
