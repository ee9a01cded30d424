// libs/appointment-cell/src/services/guard.rs
use chrono::{Days, NaiveDate};
use tracing::warn;
use uuid::Uuid;

use shared_database::DatabaseError;
use shared_models::ContactIdentity;

use crate::models::{
    Appointment, AppointmentError, AppointmentPatch, AppointmentStatus, BlockedTimeRange,
    CreateAppointmentRequest, Demographics, NewAppointment, UpdateAppointmentRequest,
    REASON_MAX_CHARS, REASON_MIN_CHARS,
};
use crate::services::catalog::{SlotTime, TimeSlotCatalog};
use crate::services::store::{ACTIVE_SLOT_CONSTRAINT, NUMBER_CONSTRAINT};

/// First date a booking made on `today` may target.
pub fn earliest_bookable_date(today: NaiveDate, lead_days: u32) -> NaiveDate {
    today
        .checked_add_days(Days::new(u64::from(lead_days)))
        .unwrap_or(NaiveDate::MAX)
}

/// A create request that passed field validation, waiting for its number.
#[derive(Debug, Clone)]
pub struct BookingDraft {
    pub patient_id: Option<Uuid>,
    pub demographics: Demographics,
    pub preferred_date: NaiveDate,
    pub preferred_time: SlotTime,
    pub reason_for_visit: String,
    pub contact_number: Option<String>,
    pub address: Option<String>,
}

impl BookingDraft {
    pub fn into_new_appointment(self, appointment_number: String) -> NewAppointment {
        NewAppointment {
            appointment_number,
            patient_id: self.patient_id,
            demographics: self.demographics,
            preferred_date: self.preferred_date,
            preferred_time: self.preferred_time,
            reason_for_visit: self.reason_for_visit,
            status: AppointmentStatus::Pending,
            contact_number: self.contact_number,
            address: self.address,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BookingGuard {
    catalog: TimeSlotCatalog,
    lead_days: u32,
}

impl BookingGuard {
    pub fn new(catalog: TimeSlotCatalog, lead_days: u32) -> Self {
        Self { catalog, lead_days }
    }

    pub fn lead_days(&self) -> u32 {
        self.lead_days
    }

    pub fn earliest_bookable_date(&self, today: NaiveDate) -> NaiveDate {
        earliest_bookable_date(today, self.lead_days)
    }

    /// Day granularity: the time of day `today` was taken at is irrelevant.
    pub fn check_lead_time(&self, date: NaiveDate, today: NaiveDate) -> Result<(), AppointmentError> {
        let earliest_date = self.earliest_bookable_date(today);
        if date < earliest_date {
            warn!("Rejected booking for {}: earliest bookable date is {}", date, earliest_date);
            return Err(AppointmentError::LeadTimeViolation {
                lead_days: self.lead_days,
                earliest_date,
            });
        }
        Ok(())
    }

    pub fn parse_slot(&self, raw: &str) -> Result<SlotTime, AppointmentError> {
        let time = SlotTime::parse(raw.trim())
            .map_err(|e| AppointmentError::ValidationError(e.to_string()))?;
        if !self.catalog.contains(time) {
            return Err(AppointmentError::ValidationError(format!(
                "{} is not one of the clinic's bookable times",
                time
            )));
        }
        Ok(time)
    }

    pub fn check_blocked(&self, date: NaiveDate, ranges: &[BlockedTimeRange]) -> Result<(), AppointmentError> {
        match ranges.iter().find(|range| range.covers(date)) {
            Some(range) => {
                warn!("Rejected booking for blocked date {}", date);
                Err(AppointmentError::DateBlocked {
                    date,
                    reason: range.display_reason(),
                })
            }
            None => Ok(()),
        }
    }

    /// Early, friendlier answer for the common case. The unique index still
    /// decides when two requests race.
    pub fn check_not_taken(
        &self,
        existing: Option<&Appointment>,
        date: NaiveDate,
        time: SlotTime,
    ) -> Result<(), AppointmentError> {
        match existing {
            Some(_) => Err(AppointmentError::SlotConflict { date, time }),
            None => Ok(()),
        }
    }

    /// Turns a failed write into the domain error the caller should see.
    pub fn map_write_error(&self, error: DatabaseError, date: NaiveDate, time: SlotTime) -> AppointmentError {
        if error.is_unique_violation_of(ACTIVE_SLOT_CONSTRAINT) {
            warn!("Slot {} {} was taken concurrently", date, time);
            return AppointmentError::SlotConflict { date, time };
        }
        if error.is_unique_violation_of(NUMBER_CONSTRAINT) {
            return AppointmentError::DatabaseError(format!("Appointment number collision: {}", error));
        }
        AppointmentError::DatabaseError(error.to_string())
    }

    pub fn validate_create(&self, request: CreateAppointmentRequest) -> Result<BookingDraft, AppointmentError> {
        let mut demographics = request.demographics;
        demographics.first_name = required("first_name", &demographics.first_name)?;
        demographics.last_name = required("last_name", &demographics.last_name)?;
        demographics.middle_name = optional_text(demographics.middle_name);
        demographics.blood_pressure = optional_text(demographics.blood_pressure);
        demographics.mother_info = demographics.mother_info.and_then(|info| info.normalized());
        demographics.father_info = demographics.father_info.and_then(|info| info.normalized());

        if request.preferred_time.trim().is_empty() {
            return Err(AppointmentError::ValidationError("preferred_time is required".to_string()));
        }
        let preferred_time = self.parse_slot(&request.preferred_time)?;

        Ok(BookingDraft {
            patient_id: request.patient_id,
            demographics,
            preferred_date: request.preferred_date,
            preferred_time,
            reason_for_visit: validate_reason(&request.reason_for_visit)?,
            contact_number: optional_text(request.contact_number)
                .map(|raw| validate_contact_number(&raw))
                .transpose()?,
            address: optional_text(request.address),
        })
    }

    /// Blank strings in an update are treated like absent fields.
    pub fn validate_update(&self, request: UpdateAppointmentRequest) -> Result<AppointmentPatch, AppointmentError> {
        let first_name = optional_text(request.first_name);
        let last_name = optional_text(request.last_name);
        let preferred_time = optional_text(request.preferred_time)
            .map(|raw| self.parse_slot(&raw))
            .transpose()?;
        let reason_for_visit = optional_text(request.reason_for_visit)
            .map(|v| validate_reason(&v))
            .transpose()?;
        let contact_number = optional_text(request.contact_number)
            .map(|raw| validate_contact_number(&raw))
            .transpose()?;

        Ok(AppointmentPatch {
            first_name,
            middle_name: optional_text(request.middle_name),
            last_name,
            birthdate: request.birthdate,
            sex: request.sex,
            height_cm: request.height_cm,
            weight_kg: request.weight_kg,
            temperature_c: request.temperature_c,
            blood_pressure: optional_text(request.blood_pressure),
            pulse_rate: request.pulse_rate,
            mother_info: request.mother_info.map(|info| info.normalized()),
            father_info: request.father_info.map(|info| info.normalized()),
            preferred_date: request.preferred_date,
            preferred_time,
            reason_for_visit,
            contact_number,
            address: optional_text(request.address),
            status: request.status,
        })
    }
}

fn required(field: &str, value: &str) -> Result<String, AppointmentError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppointmentError::ValidationError(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_reason(raw: &str) -> Result<String, AppointmentError> {
    let reason = raw.trim();
    let length = reason.chars().count();
    if !(REASON_MIN_CHARS..=REASON_MAX_CHARS).contains(&length) {
        return Err(AppointmentError::ValidationError(format!(
            "reason_for_visit must be between {} and {} characters",
            REASON_MIN_CHARS, REASON_MAX_CHARS
        )));
    }
    Ok(reason.to_string())
}

fn validate_contact_number(raw: &str) -> Result<String, AppointmentError> {
    ContactIdentity::parse_phone(raw)
        .map(|phone| phone.as_str().to_string())
        .map_err(|e| AppointmentError::ValidationError(e.to_string()))
}
