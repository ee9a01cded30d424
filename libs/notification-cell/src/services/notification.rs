use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::DatabaseError;

use crate::models::{NewNotification, Notification, NotificationError, NotificationQuery};
use crate::services::store::NotificationStore;

pub struct NotificationService {
    store: Arc<dyn NotificationStore>,
}

impl NotificationService {
    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        Self { store }
    }

    /// General-purpose creation. A notification that already exists for the
    /// same (source, entity, type, entity type) tuple is reported as an error.
    pub async fn create(&self, notification: NewNotification) -> Result<Notification, NotificationError> {
        Self::validate(&notification)?;

        let notification_type = notification.notification_type;
        let entity_type = notification.entity_type;
        let entity_id = notification.entity_id.clone();

        match self.store.insert(notification).await {
            Ok(created) => {
                info!("Created {} notification {}", created.notification_type, created.id);
                Ok(created)
            }
            Err(DatabaseError::UniqueViolation { .. }) => {
                warn!("Duplicate {} notification for {} {}", notification_type, entity_type, entity_id);
                Err(NotificationError::DuplicateNotification {
                    notification_type,
                    entity_type,
                    entity_id,
                })
            }
            Err(e) => Err(NotificationError::DatabaseError(e.to_string())),
        }
    }

    /// Creation path used while booking appointments. Safe to call repeatedly:
    /// an existing notification for the tuple yields `Ok(None)`.
    pub async fn create_appointment_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Option<Notification>, NotificationError> {
        Self::validate(&notification)?;

        let entity_id = notification.entity_id.clone();
        match self.store.insert(notification).await {
            Ok(created) => {
                info!("Created appointment notification {} for {}", created.id, entity_id);
                Ok(Some(created))
            }
            Err(DatabaseError::UniqueViolation { .. }) => {
                debug!("Appointment notification for {} already exists", entity_id);
                Ok(None)
            }
            Err(e) => Err(NotificationError::DatabaseError(e.to_string())),
        }
    }

    pub async fn list(&self, query: &NotificationQuery) -> Result<Vec<Notification>, NotificationError> {
        self.store
            .list(query)
            .await
            .map_err(|e| NotificationError::DatabaseError(e.to_string()))
    }

    pub async fn mark_read(&self, id: Uuid) -> Result<Notification, NotificationError> {
        self.store
            .mark_read(id)
            .await
            .map_err(|e| NotificationError::DatabaseError(e.to_string()))?
            .ok_or(NotificationError::NotFound)
    }

    pub async fn delete(&self, id: Uuid) -> Result<Notification, NotificationError> {
        let deleted = self.store
            .delete(id)
            .await
            .map_err(|e| NotificationError::DatabaseError(e.to_string()))?
            .ok_or(NotificationError::NotFound)?;
        info!("Deleted notification {}", id);
        Ok(deleted)
    }

    fn validate(notification: &NewNotification) -> Result<(), NotificationError> {
        if notification.source_id.trim().is_empty() {
            return Err(NotificationError::ValidationError("source_id is required".to_string()));
        }
        if notification.entity_id.trim().is_empty() {
            return Err(NotificationError::ValidationError("entity_id is required".to_string()));
        }
        if notification.message.trim().is_empty() {
            return Err(NotificationError::ValidationError("message is required".to_string()));
        }
        Ok(())
    }
}
