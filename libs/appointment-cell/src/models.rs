// libs/appointment-cell/src/models.rs
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use notification_cell::models::SmsResult;

use crate::services::catalog::SlotTime;

pub const REASON_MIN_CHARS: usize = 5;
pub const REASON_MAX_CHARS: usize = 200;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub appointment_number: String,
    pub patient_id: Option<Uuid>,
    #[serde(flatten)]
    pub demographics: Demographics,
    pub preferred_date: NaiveDate,
    pub preferred_time: SlotTime,
    pub reason_for_visit: String,
    pub status: AppointmentStatus,
    pub contact_number: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn full_name(&self) -> String {
        self.demographics.full_name()
    }

    pub fn occupies_slot(&self) -> bool {
        self.status.is_active()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Scheduled,
    Completed,
    Cancelled,
    Rebooked,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 5] = [
        AppointmentStatus::Pending,
        AppointmentStatus::Scheduled,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::Rebooked,
    ];

    /// Every status except `Cancelled` holds its slot.
    pub fn is_active(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled)
    }

    /// Identifier of the SMS template announcing a move into this status.
    pub fn sms_template_id(&self) -> String {
        format!("appointment_{}", self)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::Rebooked => write!(f, "rebooked"),
        }
    }
}

impl FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown appointment status '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Male,
    Female,
}

/// Name, age and occupation of a parent. Kept only when something is filled in.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ParentInfo {
    pub name: Option<String>,
    pub age: Option<u32>,
    pub occupation: Option<String>,
}

impl ParentInfo {
    pub fn normalized(self) -> Option<Self> {
        let clean = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let info = ParentInfo {
            name: clean(self.name),
            age: self.age,
            occupation: clean(self.occupation),
        };
        if info.name.is_none() && info.age.is_none() && info.occupation.is_none() {
            None
        } else {
            Some(info)
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Demographics {
    #[serde(default)]
    pub first_name: String,
    pub middle_name: Option<String>,
    #[serde(default)]
    pub last_name: String,
    pub birthdate: Option<NaiveDate>,
    pub sex: Option<Sex>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub temperature_c: Option<f64>,
    pub blood_pressure: Option<String>,
    pub pulse_rate: Option<u32>,
    pub mother_info: Option<ParentInfo>,
    pub father_info: Option<ParentInfo>,
}

impl Demographics {
    pub fn full_name(&self) -> String {
        [Some(self.first_name.as_str()), self.middle_name.as_deref(), Some(self.last_name.as_str())]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Row written on creation; id and timestamps are assigned by the store.
#[derive(Debug, Clone, Serialize)]
pub struct NewAppointment {
    pub appointment_number: String,
    pub patient_id: Option<Uuid>,
    #[serde(flatten)]
    pub demographics: Demographics,
    pub preferred_date: NaiveDate,
    pub preferred_time: SlotTime,
    pub reason_for_visit: String,
    pub status: AppointmentStatus,
    pub contact_number: Option<String>,
    pub address: Option<String>,
}

// ==============================================================================
// BLOCKED DATES
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    Holiday,
    Maintenance,
    StaffMeeting,
    Emergency,
    Other,
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockReason::Holiday => write!(f, "Holiday"),
            BlockReason::Maintenance => write!(f, "Clinic maintenance"),
            BlockReason::StaffMeeting => write!(f, "Staff meeting"),
            BlockReason::Emergency => write!(f, "Emergency closure"),
            BlockReason::Other => write!(f, "Clinic closed"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlockedTimeRange {
    pub id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_active: bool,
    pub reason: BlockReason,
    pub custom_reason: Option<String>,
}

impl BlockedTimeRange {
    /// Inclusive on both ends, inactive ranges never block.
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.is_active && self.start_date <= date && date <= self.end_date
    }

    pub fn display_reason(&self) -> String {
        match self.custom_reason.as_deref().map(str::trim) {
            Some(custom) if !custom.is_empty() => custom.to_string(),
            _ => self.reason.to_string(),
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_id: Option<Uuid>,
    #[serde(flatten)]
    pub demographics: Demographics,
    pub preferred_date: NaiveDate,
    #[serde(default)]
    pub preferred_time: String,
    #[serde(default)]
    pub reason_for_visit: String,
    pub contact_number: Option<String>,
    pub address: Option<String>,
}

/// Partial update as received. Absent and `null` fields are both left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub sex: Option<Sex>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub temperature_c: Option<f64>,
    pub blood_pressure: Option<String>,
    pub pulse_rate: Option<u32>,
    pub mother_info: Option<ParentInfo>,
    pub father_info: Option<ParentInfo>,
    pub preferred_date: Option<NaiveDate>,
    pub preferred_time: Option<String>,
    pub reason_for_visit: Option<String>,
    pub contact_number: Option<String>,
    pub address: Option<String>,
    pub status: Option<AppointmentStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: AppointmentStatus,
}

/// Validated partial update applied field by field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppointmentPatch {
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub sex: Option<Sex>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub temperature_c: Option<f64>,
    pub blood_pressure: Option<String>,
    pub pulse_rate: Option<u32>,
    /// `Some(None)` clears the substructure.
    pub mother_info: Option<Option<ParentInfo>>,
    pub father_info: Option<Option<ParentInfo>>,
    pub preferred_date: Option<NaiveDate>,
    pub preferred_time: Option<SlotTime>,
    pub reason_for_visit: Option<String>,
    pub contact_number: Option<String>,
    pub address: Option<String>,
    pub status: Option<AppointmentStatus>,
}

impl AppointmentPatch {
    pub fn status_only(status: AppointmentStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn moves_slot(&self) -> bool {
        self.preferred_date.is_some() || self.preferred_time.is_some()
    }

    pub fn apply(&self, appointment: &mut Appointment) {
        let d = &mut appointment.demographics;
        if let Some(v) = &self.first_name { d.first_name = v.clone(); }
        if let Some(v) = &self.middle_name { d.middle_name = Some(v.clone()); }
        if let Some(v) = &self.last_name { d.last_name = v.clone(); }
        if let Some(v) = self.birthdate { d.birthdate = Some(v); }
        if let Some(v) = self.sex { d.sex = Some(v); }
        if let Some(v) = self.height_cm { d.height_cm = Some(v); }
        if let Some(v) = self.weight_kg { d.weight_kg = Some(v); }
        if let Some(v) = self.temperature_c { d.temperature_c = Some(v); }
        if let Some(v) = &self.blood_pressure { d.blood_pressure = Some(v.clone()); }
        if let Some(v) = self.pulse_rate { d.pulse_rate = Some(v); }
        if let Some(v) = &self.mother_info { d.mother_info = v.clone(); }
        if let Some(v) = &self.father_info { d.father_info = v.clone(); }
        if let Some(v) = self.preferred_date { appointment.preferred_date = v; }
        if let Some(v) = self.preferred_time { appointment.preferred_time = v; }
        if let Some(v) = &self.reason_for_visit { appointment.reason_for_visit = v.clone(); }
        if let Some(v) = &self.contact_number { appointment.contact_number = Some(v.clone()); }
        if let Some(v) = &self.address { appointment.address = Some(v.clone()); }
        if let Some(v) = self.status { appointment.status = v; }
    }

    /// Column map for a PostgREST PATCH; only present fields are written.
    pub fn to_update_map(&self) -> Map<String, Value> {
        let mut update_data = Map::new();

        if let Some(v) = &self.first_name { update_data.insert("first_name".to_string(), json!(v)); }
        if let Some(v) = &self.middle_name { update_data.insert("middle_name".to_string(), json!(v)); }
        if let Some(v) = &self.last_name { update_data.insert("last_name".to_string(), json!(v)); }
        if let Some(v) = self.birthdate { update_data.insert("birthdate".to_string(), json!(v)); }
        if let Some(v) = self.sex { update_data.insert("sex".to_string(), json!(v)); }
        if let Some(v) = self.height_cm { update_data.insert("height_cm".to_string(), json!(v)); }
        if let Some(v) = self.weight_kg { update_data.insert("weight_kg".to_string(), json!(v)); }
        if let Some(v) = self.temperature_c { update_data.insert("temperature_c".to_string(), json!(v)); }
        if let Some(v) = &self.blood_pressure { update_data.insert("blood_pressure".to_string(), json!(v)); }
        if let Some(v) = self.pulse_rate { update_data.insert("pulse_rate".to_string(), json!(v)); }
        if let Some(v) = &self.mother_info { update_data.insert("mother_info".to_string(), json!(v)); }
        if let Some(v) = &self.father_info { update_data.insert("father_info".to_string(), json!(v)); }
        if let Some(v) = self.preferred_date { update_data.insert("preferred_date".to_string(), json!(v)); }
        if let Some(v) = self.preferred_time { update_data.insert("preferred_time".to_string(), json!(v)); }
        if let Some(v) = &self.reason_for_visit { update_data.insert("reason_for_visit".to_string(), json!(v)); }
        if let Some(v) = &self.contact_number { update_data.insert("contact_number".to_string(), json!(v)); }
        if let Some(v) = &self.address { update_data.insert("address".to_string(), json!(v)); }
        if let Some(v) = self.status { update_data.insert("status".to_string(), json!(v)); }

        update_data
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentQuery {
    pub status: Option<AppointmentStatus>,
    pub patient_id: Option<Uuid>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub skip: Option<usize>,
    pub limit: Option<usize>,
}

impl AppointmentQuery {
    pub const DEFAULT_LIMIT: usize = 50;
    pub const MAX_LIMIT: usize = 200;

    pub fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT)
    }

    pub fn effective_skip(&self) -> usize {
        self.skip.unwrap_or(0)
    }

    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.status.map_or(true, |s| appointment.status == s)
            && self.patient_id.map_or(true, |p| appointment.patient_id == Some(p))
            && self.from_date.map_or(true, |d| appointment.preferred_date >= d)
            && self.to_date.map_or(true, |d| appointment.preferred_date <= d)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateAppointmentResponse {
    pub appointment: Appointment,
    pub sms_result: Option<SmsResult>,
}

// ==============================================================================
// AVAILABILITY MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    Available,
    Booked,
    Passed,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SlotAvailability {
    pub time: SlotTime,
    pub display: String,
    pub state: SlotState,
    pub label: String,
}

impl SlotAvailability {
    pub fn new(time: SlotTime, state: SlotState) -> Self {
        let display = time.to_12_hour();
        let label = match state {
            SlotState::Available => display.clone(),
            SlotState::Booked => format!("{} (Booked)", display),
            SlotState::Passed => format!("{} (Passed)", display),
        };
        Self { time, display, state, label }
    }

    pub fn is_available(&self) -> bool {
        self.state == SlotState::Available
    }
}

/// Why a date can or cannot be booked. Each cause is reported separately.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DayStatus {
    Blocked { reason: String },
    TooSoon { earliest_date: NaiveDate },
    FullyBooked,
    Open,
}

#[derive(Debug, Clone, Serialize)]
pub struct AvailableSlotsResponse {
    pub date: NaiveDate,
    pub day_status: DayStatus,
    pub total_appointments: usize,
    pub available_time_slots: Vec<SlotTime>,
    pub time_slots: BTreeMap<SlotTime, Vec<Appointment>>,
    pub slots: Vec<SlotAvailability>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Appointments must be booked at least {lead_days} days in advance. The earliest available date is {earliest_date}")]
    LeadTimeViolation { lead_days: u32, earliest_date: NaiveDate },

    #[error("The {time} slot on {date} is already booked. Please choose a different time")]
    SlotConflict { date: NaiveDate, time: SlotTime },

    #[error("The clinic is not accepting appointments on {date}: {reason}")]
    DateBlocked { date: NaiveDate, reason: String },

    #[error("Appointment status cannot change from {from} to {to}")]
    InvalidStatusTransition { from: AppointmentStatus, to: AppointmentStatus },

    #[error("Database error: {0}")]
    DatabaseError(String),
}
