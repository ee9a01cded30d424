// libs/appointment-cell/src/services/store.rs
use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use shared_database::DatabaseError;

use crate::models::{Appointment, AppointmentPatch, AppointmentQuery, BlockedTimeRange, NewAppointment};
use crate::services::catalog::SlotTime;

/// Partial unique index on (preferred_date, preferred_time) over non-cancelled rows.
pub const ACTIVE_SLOT_CONSTRAINT: &str = "appointments_active_slot_key";

/// Unique index on appointment_number.
pub const NUMBER_CONSTRAINT: &str = "appointments_number_key";

/// Counter row used for appointment numbers.
pub const APPOINTMENT_SEQUENCE_KEY: &str = "appointment_number";

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Fails with [`DatabaseError::UniqueViolation`] naming
    /// [`ACTIVE_SLOT_CONSTRAINT`] when the slot is already held.
    async fn insert(&self, appointment: NewAppointment) -> Result<Appointment, DatabaseError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, DatabaseError>;

    async fn find_active_at(
        &self,
        date: NaiveDate,
        time: SlotTime,
    ) -> Result<Option<Appointment>, DatabaseError>;

    /// Non-cancelled appointments on `date`, ordered by time.
    async fn list_active_for_date(&self, date: NaiveDate) -> Result<Vec<Appointment>, DatabaseError>;

    async fn list(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>, DatabaseError>;

    /// Same uniqueness rule as `insert` when the patch moves or reactivates a slot.
    async fn update(&self, id: Uuid, patch: &AppointmentPatch) -> Result<Option<Appointment>, DatabaseError>;

    async fn delete(&self, id: Uuid) -> Result<Option<Appointment>, DatabaseError>;
}

#[async_trait]
pub trait BlockedRangeStore: Send + Sync {
    async fn active_ranges_covering(&self, date: NaiveDate) -> Result<Vec<BlockedTimeRange>, DatabaseError>;
}

/// Atomic counter. A value handed out is never handed out again.
#[async_trait]
pub trait SequenceAllocator: Send + Sync {
    async fn next(&self, key: &str) -> Result<String, DatabaseError>;
}

pub fn format_sequence(value: u64) -> String {
    format!("{:06}", value)
}
