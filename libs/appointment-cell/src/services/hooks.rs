// libs/appointment-cell/src/services/hooks.rs
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use notification_cell::models::{
    EntityType, NewNotification, Notification, NotificationType, SmsFailureReason, SmsFields, SmsResult,
    SourceType,
};
use notification_cell::services::{NotificationService, SmsNotifier};

use crate::models::{Appointment, AppointmentStatus};

/// Something that already happened to an appointment and is now durable.
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    Created {
        appointment: Appointment,
        create_notification: bool,
    },
    StatusChanged {
        appointment: Appointment,
        old_status: AppointmentStatus,
        new_status: AppointmentStatus,
    },
}

#[derive(Debug, Clone)]
pub enum HookReport {
    Sms(SmsResult),
    Notification(Option<Notification>),
    Skipped,
}

/// Runs after the write it reacts to has been committed. Hooks report what
/// they did and never fail the operation that triggered them.
#[async_trait]
pub trait PostCommitHook: Send + Sync {
    fn name(&self) -> &'static str;

    async fn on_event(&self, event: &LifecycleEvent) -> HookReport;
}

pub fn sms_fields(appointment: &Appointment) -> SmsFields {
    let mut fields = SmsFields::new();
    fields.insert("name".to_string(), appointment.full_name());
    fields.insert(
        "date".to_string(),
        appointment.preferred_date.format("%B %-d, %Y").to_string(),
    );
    fields.insert("time".to_string(), appointment.preferred_time.to_12_hour());
    fields.insert("number".to_string(), appointment.appointment_number.clone());
    fields
}

/// Upper bound on how long a status update waits for the SMS gateway.
pub const DEFAULT_SMS_TIMEOUT: Duration = Duration::from_secs(10);

/// Texts the patient when an appointment's status changes.
pub struct SmsStatusHook {
    notifier: Arc<dyn SmsNotifier>,
    send_timeout: Duration,
}

impl SmsStatusHook {
    pub fn new(notifier: Arc<dyn SmsNotifier>) -> Self {
        Self::with_timeout(notifier, DEFAULT_SMS_TIMEOUT)
    }

    pub fn with_timeout(notifier: Arc<dyn SmsNotifier>, send_timeout: Duration) -> Self {
        Self { notifier, send_timeout }
    }
}

#[async_trait]
impl PostCommitHook for SmsStatusHook {
    fn name(&self) -> &'static str {
        "sms_status"
    }

    async fn on_event(&self, event: &LifecycleEvent) -> HookReport {
        let LifecycleEvent::StatusChanged { appointment, old_status, new_status } = event else {
            return HookReport::Skipped;
        };

        let Some(destination) = appointment.contact_number.as_deref() else {
            debug!("Appointment {} has no contact number, skipping SMS", appointment.id);
            let result = if self.notifier.is_delivering() {
                SmsResult::failed(SmsFailureReason::InvalidNumber, "No contact number on file")
            } else {
                SmsResult::failed(SmsFailureReason::DevelopmentSkip, "SMS delivery is disabled")
            };
            return HookReport::Sms(result);
        };

        let template_id = new_status.sms_template_id();
        let fields = sms_fields(appointment);
        let result = match timeout(self.send_timeout, self.notifier.send(destination, &template_id, &fields)).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!("SMS for appointment {} failed: {}", appointment.id, e);
                SmsResult::failed(SmsFailureReason::DeliveryFailed, e.to_string())
            }
            Err(_) => {
                warn!(
                    "SMS for appointment {} timed out after {:?}",
                    appointment.id, self.send_timeout
                );
                SmsResult::failed(SmsFailureReason::DeliveryFailed, "timed out")
            }
        };

        info!(
            "Status SMS for appointment {} ({} -> {}): success={}",
            appointment.id, old_status, new_status, result.success
        );
        HookReport::Sms(result)
    }
}

/// Tells staff that a patient booked an appointment.
pub struct CreationNotificationHook {
    notifications: Arc<NotificationService>,
}

impl CreationNotificationHook {
    pub fn new(notifications: Arc<NotificationService>) -> Self {
        Self { notifications }
    }
}

#[async_trait]
impl PostCommitHook for CreationNotificationHook {
    fn name(&self) -> &'static str {
        "creation_notification"
    }

    async fn on_event(&self, event: &LifecycleEvent) -> HookReport {
        let LifecycleEvent::Created { appointment, create_notification: true } = event else {
            return HookReport::Skipped;
        };

        let source_id = appointment
            .patient_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| appointment.id.to_string());

        let notification = NewNotification {
            source_id,
            source_type: SourceType::User,
            notification_type: NotificationType::AppointmentCreated,
            entity_id: appointment.id.to_string(),
            entity_type: EntityType::Appointment,
            message: format!(
                "New appointment request from {} for {} at {}",
                appointment.full_name(),
                appointment.preferred_date.format("%B %-d, %Y"),
                appointment.preferred_time.to_12_hour()
            ),
        };

        match self.notifications.create_appointment_notification(notification).await {
            Ok(created) => HookReport::Notification(created),
            Err(e) => {
                warn!("Creation notification for appointment {} failed: {}", appointment.id, e);
                HookReport::Notification(None)
            }
        }
    }
}
