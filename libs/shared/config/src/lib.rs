use std::env;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveTime;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Staging,
    Production,
}

impl FromStr for AppEnvironment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" => Ok(AppEnvironment::Development),
            "staging" | "stage" => Ok(AppEnvironment::Staging),
            "production" | "prod" => Ok(AppEnvironment::Production),
            other => Err(format!("unknown environment '{}'", other)),
        }
    }
}

impl fmt::Display for AppEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppEnvironment::Development => write!(f, "development"),
            AppEnvironment::Staging => write!(f, "staging"),
            AppEnvironment::Production => write!(f, "production"),
        }
    }
}

/// Operating hours and booking rules of the clinic.
#[derive(Debug, Clone)]
pub struct ClinicScheduleConfig {
    pub opening_time: NaiveTime,
    /// First instant that is no longer bookable.
    pub closing_time: NaiveTime,
    pub slot_minutes: u32,
    pub utc_offset_minutes: i32,
    pub booking_lead_days: u32,
    pub strict_status_transitions: bool,
}

impl Default for ClinicScheduleConfig {
    fn default() -> Self {
        Self {
            opening_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
            closing_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap_or(NaiveTime::MIN),
            slot_minutes: 30,
            utc_offset_minutes: 0,
            booking_lead_days: 2,
            strict_status_transitions: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    pub supabase_jwt_secret: String,
    pub app_env: AppEnvironment,
    pub sms_api_url: String,
    pub sms_api_key: String,
    pub sms_sender_name: String,
    pub clinic: ClinicScheduleConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = ClinicScheduleConfig::default();

        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_ROLE_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            app_env: parse_var("APP_ENV", AppEnvironment::Development),
            sms_api_url: env::var("SMS_API_URL")
                .unwrap_or_else(|_| {
                    warn!("SMS_API_URL not set, using empty value");
                    String::new()
                }),
            sms_api_key: env::var("SMS_API_KEY")
                .unwrap_or_else(|_| {
                    warn!("SMS_API_KEY not set, using empty value");
                    String::new()
                }),
            sms_sender_name: env::var("SMS_SENDER_NAME")
                .unwrap_or_else(|_| "CLINIC".to_string()),
            clinic: ClinicScheduleConfig {
                opening_time: parse_time_var("CLINIC_OPENING_TIME", defaults.opening_time),
                closing_time: parse_time_var("CLINIC_CLOSING_TIME", defaults.closing_time),
                slot_minutes: parse_var("CLINIC_SLOT_MINUTES", defaults.slot_minutes),
                utc_offset_minutes: parse_var("CLINIC_UTC_OFFSET_MINUTES", defaults.utc_offset_minutes),
                booking_lead_days: parse_var("BOOKING_LEAD_DAYS", defaults.booking_lead_days),
                strict_status_transitions: parse_var(
                    "STRICT_STATUS_TRANSITIONS",
                    defaults.strict_status_transitions,
                ),
            },
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        if config.clinic.slot_minutes == 0 || config.clinic.opening_time >= config.clinic.closing_time {
            warn!("Invalid clinic hours configured, falling back to defaults");
            return Self { clinic: defaults, ..config };
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn is_sms_configured(&self) -> bool {
        !self.sms_api_url.is_empty() && !self.sms_api_key.is_empty()
    }

    pub fn is_production(&self) -> bool {
        self.app_env == AppEnvironment::Production
    }

    /// Key used for server-side store access, falling back to the anon key.
    pub fn supabase_store_key(&self) -> &str {
        if self.supabase_service_role_key.is_empty() {
            &self.supabase_anon_key
        } else {
            &self.supabase_service_role_key
        }
    }
}

fn parse_var<T: FromStr + fmt::Debug>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {:?}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}

fn parse_time_var(name: &str, default: NaiveTime) -> NaiveTime {
    match env::var(name) {
        Ok(raw) => NaiveTime::parse_from_str(raw.trim(), "%H:%M").unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {}", name, raw, default.format("%H:%M"));
            default
        }),
        Err(_) => default,
    }
}
