use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{DatabaseError, SupabaseClient};

use crate::models::{NewNotification, Notification, NotificationQuery};

/// Unique index over (source_id, entity_id, type, entity_type).
pub const NOTIFICATION_TUPLE_CONSTRAINT: &str = "notifications_source_entity_type_key";

#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Inserts a notification; fails with [`DatabaseError::UniqueViolation`]
    /// when one already exists for the same tuple.
    async fn insert(&self, notification: NewNotification) -> Result<Notification, DatabaseError>;

    async fn list(&self, query: &NotificationQuery) -> Result<Vec<Notification>, DatabaseError>;

    async fn mark_read(&self, id: Uuid) -> Result<Option<Notification>, DatabaseError>;

    async fn delete(&self, id: Uuid) -> Result<Option<Notification>, DatabaseError>;
}

pub struct SupabaseNotificationStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseNotificationStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    fn first_row(rows: Vec<Value>) -> Result<Option<Notification>, DatabaseError> {
        rows.into_iter()
            .next()
            .map(serde_json::from_value)
            .transpose()
            .map_err(DatabaseError::from)
    }
}

#[async_trait]
impl NotificationStore for SupabaseNotificationStore {
    async fn insert(&self, notification: NewNotification) -> Result<Notification, DatabaseError> {
        let mut body = serde_json::to_value(&notification)?;
        if let Some(map) = body.as_object_mut() {
            map.insert("is_read".to_string(), json!(false));
        }

        let rows = self.supabase
            .request_returning(Method::POST, "/rest/v1/notifications", Some(body))
            .await?;

        Self::first_row(rows)?
            .ok_or_else(|| DatabaseError::Api { status: 200, message: "Insert returned no rows".to_string() })
    }

    async fn list(&self, query: &NotificationQuery) -> Result<Vec<Notification>, DatabaseError> {
        let mut path = format!(
            "/rest/v1/notifications?order=created_at.desc&limit={}",
            query.effective_limit()
        );
        if let Some(source_id) = &query.source_id {
            path.push_str(&format!("&source_id=eq.{}", source_id));
        }
        if query.unread_only.unwrap_or(false) {
            path.push_str("&is_read=eq.false");
        }

        debug!("Listing notifications: {}", path);
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, None, None).await?;

        rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Notification>, _>>()
            .map_err(DatabaseError::from)
    }

    async fn mark_read(&self, id: Uuid) -> Result<Option<Notification>, DatabaseError> {
        let path = format!("/rest/v1/notifications?id=eq.{}", id);
        let rows = self.supabase
            .request_returning(
                Method::PATCH,
                &path,
                Some(json!({ "is_read": true, "updated_at": Utc::now().to_rfc3339() })),
            )
            .await?;
        Self::first_row(rows)
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Notification>, DatabaseError> {
        let path = format!("/rest/v1/notifications?id=eq.{}", id);
        let rows = self.supabase.request_returning(Method::DELETE, &path, None).await?;
        Self::first_row(rows)
    }
}

/// Process-local store with the same uniqueness rule as the database index.
#[derive(Default)]
pub struct InMemoryNotificationStore {
    rows: Mutex<Vec<Notification>>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn insert(&self, notification: NewNotification) -> Result<Notification, DatabaseError> {
        let mut rows = self.rows.lock().await;

        let key = notification.dedup_key();
        let exists = rows.iter().any(|row| {
            (row.source_id.as_str(), row.entity_id.as_str(), row.notification_type, row.entity_type) == key
        });
        if exists {
            return Err(DatabaseError::UniqueViolation {
                constraint: Some(NOTIFICATION_TUPLE_CONSTRAINT.to_string()),
                message: format!(
                    "notification {} for {} {} already exists",
                    notification.notification_type, notification.entity_type, notification.entity_id
                ),
            });
        }

        let now = Utc::now();
        let row = Notification {
            id: Uuid::new_v4(),
            source_id: notification.source_id,
            source_type: notification.source_type,
            notification_type: notification.notification_type,
            entity_id: notification.entity_id,
            entity_type: notification.entity_type,
            message: notification.message,
            is_read: false,
            created_at: now,
            updated_at: now,
        };
        rows.push(row.clone());
        Ok(row)
    }

    async fn list(&self, query: &NotificationQuery) -> Result<Vec<Notification>, DatabaseError> {
        let rows = self.rows.lock().await;
        let mut found: Vec<Notification> = rows
            .iter()
            .filter(|row| query.source_id.as_ref().map_or(true, |s| &row.source_id == s))
            .filter(|row| !query.unread_only.unwrap_or(false) || !row.is_read)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        found.truncate(query.effective_limit());
        Ok(found)
    }

    async fn mark_read(&self, id: Uuid) -> Result<Option<Notification>, DatabaseError> {
        let mut rows = self.rows.lock().await;
        Ok(rows.iter_mut().find(|row| row.id == id).map(|row| {
            row.is_read = true;
            row.updated_at = Utc::now();
            row.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Notification>, DatabaseError> {
        let mut rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .position(|row| row.id == id)
            .map(|index| rows.remove(index)))
    }
}
