use std::sync::Arc;

use assert_matches::assert_matches;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use notification_cell::models::{
    EntityType, NewNotification, NotificationError, NotificationQuery, NotificationType, SourceType,
};
use notification_cell::services::store::NOTIFICATION_TUPLE_CONSTRAINT;
use notification_cell::services::{NotificationService, SupabaseNotificationStore};
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

fn new_notification() -> NewNotification {
    NewNotification {
        source_id: "patient-1".to_string(),
        source_type: SourceType::User,
        notification_type: NotificationType::AppointmentCreated,
        entity_id: "appt-1".to_string(),
        entity_type: EntityType::Appointment,
        message: "New appointment request".to_string(),
    }
}

#[tokio::test]
async fn test_insert_returns_created_row() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/notifications"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::notification_row("patient-1", "appt-1", "appointment_created")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let service = NotificationService::new(Arc::new(SupabaseNotificationStore::new(&config)));

    let created = service.create(new_notification()).await.unwrap();
    assert_eq!(created.source_id, "patient-1");
    assert_eq!(created.notification_type, NotificationType::AppointmentCreated);
}

#[tokio::test]
async fn test_unique_index_violation_is_duplicate_or_noop() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/notifications"))
        .respond_with(
            ResponseTemplate::new(409)
                .set_body_json(MockSupabaseResponses::unique_violation(NOTIFICATION_TUPLE_CONSTRAINT)),
        )
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let service = NotificationService::new(Arc::new(SupabaseNotificationStore::new(&config)));

    assert_matches!(
        service.create(new_notification()).await,
        Err(NotificationError::DuplicateNotification { .. })
    );
    assert_matches!(service.create_appointment_notification(new_notification()).await, Ok(None));
}

#[tokio::test]
async fn test_list_filters_by_source() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/notifications"))
        .and(query_param("source_id", "eq.patient-1"))
        .and(query_param("limit", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::notification_row("patient-1", "appt-1", "appointment_created")
        ])))
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let service = NotificationService::new(Arc::new(SupabaseNotificationStore::new(&config)));

    let query = NotificationQuery {
        source_id: Some("patient-1".to_string()),
        unread_only: None,
        limit: Some(10),
    };
    let notifications = service.list(&query).await.unwrap();
    assert_eq!(notifications.len(), 1);
}
