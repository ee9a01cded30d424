use std::net::SocketAddr;
use std::sync::Arc;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::{self, TraceLayer};
use tracing::{Level, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::services::{
    AppointmentBookingService, BookingDependencies, CreationNotificationHook, InMemoryAppointmentStore,
    PostCommitHook, SmsStatusHook, SystemClock,
};
use notification_cell::services::{
    HttpSmsNotifier, InMemoryNotificationStore, NotificationService, NotificationStore,
    SupabaseNotificationStore,
};
use shared_config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting clinic scheduling API server");

    // Load configuration
    let config = Arc::new(AppConfig::from_env());

    let notification_store: Arc<dyn NotificationStore> = if config.is_configured() {
        Arc::new(SupabaseNotificationStore::new(&config))
    } else {
        warn!("Supabase is not configured, using in-memory stores");
        Arc::new(InMemoryNotificationStore::new())
    };
    let notifications = Arc::new(NotificationService::new(notification_store));

    if !config.is_sms_configured() {
        warn!("SMS gateway is not configured, status messages will not be delivered");
    }
    let hooks: Vec<Arc<dyn PostCommitHook>> = vec![
        Arc::new(SmsStatusHook::new(Arc::new(HttpSmsNotifier::new(&config)))),
        Arc::new(CreationNotificationHook::new(Arc::clone(&notifications))),
    ];

    let dependencies = if config.is_configured() {
        BookingDependencies::supabase(&config, hooks)
    } else {
        BookingDependencies::in_memory(
            Arc::new(InMemoryAppointmentStore::new()),
            Arc::new(SystemClock),
            hooks,
        )
    };
    let appointments = Arc::new(AppointmentBookingService::new(&config.clinic, dependencies));

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(config, appointments, notifications)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new()
                    .level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new()
                    .level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
