// libs/notification-cell/src/services/sms.rs
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info, warn};

use shared_config::AppConfig;
use shared_models::ContactIdentity;

use crate::models::{SmsError, SmsFailureReason, SmsFields, SmsResult};

/// Gateway error codes for numbers the provider refuses.
const GATEWAY_INVALID_NUMBER: i64 = 21211;
const GATEWAY_UNVERIFIED_NUMBER: i64 = 21608;

const GATEWAY_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmsTemplate {
    AppointmentScheduled,
    AppointmentCompleted,
    AppointmentCancelled,
    AppointmentRebooked,
}

impl SmsTemplate {
    pub const ALL: [SmsTemplate; 4] = [
        SmsTemplate::AppointmentScheduled,
        SmsTemplate::AppointmentCompleted,
        SmsTemplate::AppointmentCancelled,
        SmsTemplate::AppointmentRebooked,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            SmsTemplate::AppointmentScheduled => "appointment_scheduled",
            SmsTemplate::AppointmentCompleted => "appointment_completed",
            SmsTemplate::AppointmentCancelled => "appointment_cancelled",
            SmsTemplate::AppointmentRebooked => "appointment_rebooked",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|template| template.id() == id)
    }

    fn body(&self) -> &'static str {
        match self {
            SmsTemplate::AppointmentScheduled => {
                "Hi {name}, your appointment #{number} is confirmed for {date} at {time}. Please arrive 15 minutes early."
            }
            SmsTemplate::AppointmentCompleted => {
                "Hi {name}, thank you for visiting the clinic. Appointment #{number} has been completed."
            }
            SmsTemplate::AppointmentCancelled => {
                "Hi {name}, your appointment #{number} on {date} at {time} has been cancelled. Please contact the clinic to book a new schedule."
            }
            SmsTemplate::AppointmentRebooked => {
                "Hi {name}, your appointment #{number} has been rebooked to {date} at {time}."
            }
        }
    }

    /// Substitutes `{key}` placeholders; unknown placeholders are left as-is.
    pub fn render(&self, fields: &SmsFields) -> String {
        fields.iter().fold(self.body().to_string(), |text, (key, value)| {
            text.replace(&format!("{{{}}}", key), value)
        })
    }
}

#[async_trait]
pub trait SmsNotifier: Send + Sync {
    /// Whether messages actually leave the process in this environment.
    fn is_delivering(&self) -> bool {
        true
    }

    /// Best-effort delivery. Expected refusals come back as a failed
    /// [`SmsResult`]; only unexpected gateway or transport faults are errors.
    async fn send(
        &self,
        destination: &str,
        template_id: &str,
        fields: &SmsFields,
    ) -> Result<SmsResult, SmsError>;
}

#[derive(Debug, Deserialize)]
struct GatewaySuccess {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GatewayFailure {
    code: Option<i64>,
    message: Option<String>,
}

/// SMS gateway client. Only delivers when the app runs in production.
pub struct HttpSmsNotifier {
    client: Client,
    api_url: String,
    api_key: String,
    sender_name: String,
    production: bool,
}

impl HttpSmsNotifier {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(GATEWAY_TIMEOUT)
                .build()
                .unwrap_or_else(|e| {
                    warn!("Falling back to default SMS client: {}", e);
                    Client::new()
                }),
            api_url: config.sms_api_url.trim_end_matches('/').to_string(),
            api_key: config.sms_api_key.clone(),
            sender_name: config.sms_sender_name.clone(),
            production: config.is_production(),
        }
    }

    fn is_configured(&self) -> bool {
        !self.api_url.is_empty() && !self.api_key.is_empty()
    }
}

#[async_trait]
impl SmsNotifier for HttpSmsNotifier {
    fn is_delivering(&self) -> bool {
        self.production
    }

    async fn send(
        &self,
        destination: &str,
        template_id: &str,
        fields: &SmsFields,
    ) -> Result<SmsResult, SmsError> {
        let Some(template) = SmsTemplate::from_id(template_id) else {
            debug!("No SMS template registered for '{}'", template_id);
            return Ok(SmsResult::failed(
                SmsFailureReason::NoTemplate,
                format!("No SMS template for '{}'", template_id),
            ));
        };

        let text = template.render(fields);

        if !self.production {
            info!("Skipping SMS to {} outside production: {}", destination, text);
            return Ok(SmsResult::failed(SmsFailureReason::DevelopmentSkip, text));
        }

        let number = match ContactIdentity::parse_phone(destination) {
            Ok(contact) => contact.to_string(),
            Err(e) => {
                warn!("Not sending SMS: {}", e);
                return Ok(SmsResult::failed(SmsFailureReason::InvalidNumber, e.to_string()));
            }
        };

        if !self.is_configured() {
            return Err(SmsError::NotConfigured);
        }

        let url = format!("{}/messages", self.api_url);
        debug!("Sending {} SMS to {}", template.id(), number);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({
                "to": number,
                "from": self.sender_name,
                "body": text,
            }))
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        if status.is_success() {
            let provider_id = serde_json::from_str::<GatewaySuccess>(&response_text)
                .ok()
                .and_then(|body| body.id);
            info!("SMS {} delivered to gateway for {}", template.id(), number);
            return Ok(SmsResult::sent(provider_id, text));
        }

        if status.is_client_error() {
            if let Ok(failure) = serde_json::from_str::<GatewayFailure>(&response_text) {
                let message = failure.message.unwrap_or_else(|| response_text.clone());
                match failure.code {
                    Some(GATEWAY_INVALID_NUMBER) => {
                        warn!("Gateway rejected {} as invalid", number);
                        return Ok(SmsResult::failed(SmsFailureReason::InvalidNumber, message));
                    }
                    Some(GATEWAY_UNVERIFIED_NUMBER) => {
                        warn!("Gateway refused unverified number {}", number);
                        return Ok(SmsResult::failed(SmsFailureReason::UnverifiedNumber, message));
                    }
                    _ => {}
                }
            }
        }

        error!("SMS gateway failed: {} - {}", status, response_text);
        Err(SmsError::Gateway {
            status: status.as_u16(),
            message: response_text,
        })
    }
}
