pub mod notification;
pub mod sms;
pub mod store;

pub use notification::NotificationService;
pub use sms::{HttpSmsNotifier, SmsNotifier, SmsTemplate};
pub use store::{InMemoryNotificationStore, NotificationStore, SupabaseNotificationStore};
