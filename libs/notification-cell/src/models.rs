// libs/notification-cell/src/models.rs
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==============================================================================
// NOTIFICATION MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub source_id: String,
    pub source_type: SourceType,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub entity_id: String,
    pub entity_type: EntityType,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    AppointmentCreated,
    AppointmentStatusChanged,
    AppointmentReminder,
    System,
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationType::AppointmentCreated => write!(f, "appointment_created"),
            NotificationType::AppointmentStatusChanged => write!(f, "appointment_status_changed"),
            NotificationType::AppointmentReminder => write!(f, "appointment_reminder"),
            NotificationType::System => write!(f, "system"),
        }
    }
}

/// Who caused the notification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    User,
    Staff,
    System,
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceType::User => write!(f, "user"),
            SourceType::Staff => write!(f, "staff"),
            SourceType::System => write!(f, "system"),
        }
    }
}

/// What the notification is about.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Appointment,
    Patient,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityType::Appointment => write!(f, "appointment"),
            EntityType::Patient => write!(f, "patient"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNotification {
    pub source_id: String,
    pub source_type: SourceType,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub entity_id: String,
    pub entity_type: EntityType,
    pub message: String,
}

impl NewNotification {
    /// The tuple a notification is unique on.
    pub fn dedup_key(&self) -> (&str, &str, NotificationType, EntityType) {
        (&self.source_id, &self.entity_id, self.notification_type, self.entity_type)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationQuery {
    pub source_id: Option<String>,
    pub unread_only: Option<bool>,
    pub limit: Option<usize>,
}

impl NotificationQuery {
    pub const DEFAULT_LIMIT: usize = 50;
    pub const MAX_LIMIT: usize = 200;

    pub fn effective_limit(&self) -> usize {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Notification already exists for {notification_type} on {entity_type} {entity_id}")]
    DuplicateNotification {
        notification_type: NotificationType,
        entity_type: EntityType,
        entity_id: String,
    },

    #[error("Notification not found")]
    NotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

// ==============================================================================
// SMS MODELS
// ==============================================================================

/// Placeholder values substituted into an SMS template.
pub type SmsFields = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SmsFailureReason {
    InvalidNumber,
    UnverifiedNumber,
    NoTemplate,
    DevelopmentSkip,
    DeliveryFailed,
}

/// Outcome of an SMS attempt. Expected failures are reported here, not raised.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SmsResult {
    pub success: bool,
    pub reason: Option<SmsFailureReason>,
    pub message: Option<String>,
    pub provider_message_id: Option<String>,
}

impl SmsResult {
    pub fn sent(provider_message_id: Option<String>, message: String) -> Self {
        Self {
            success: true,
            reason: None,
            message: Some(message),
            provider_message_id,
        }
    }

    pub fn failed(reason: SmsFailureReason, message: impl Into<String>) -> Self {
        Self {
            success: false,
            reason: Some(reason),
            message: Some(message.into()),
            provider_message_id: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SmsError {
    #[error("SMS gateway is not configured")]
    NotConfigured,

    #[error("SMS gateway error ({status}): {message}")]
    Gateway { status: u16, message: String },

    #[error("SMS transport error: {0}")]
    Transport(#[from] reqwest::Error),
}
