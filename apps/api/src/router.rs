use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::router::appointment_routes;
use appointment_cell::services::AppointmentBookingService;
use notification_cell::router::notification_routes;
use notification_cell::services::NotificationService;
use shared_config::AppConfig;

pub fn create_router(
    config: Arc<AppConfig>,
    appointments: Arc<AppointmentBookingService>,
    notifications: Arc<NotificationService>,
) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic scheduling API is running!" }))
        .nest("/appointments", appointment_routes(config.clone(), appointments))
        .nest("/notifications", notification_routes(config, notifications))
}
