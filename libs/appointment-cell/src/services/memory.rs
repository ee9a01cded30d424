// libs/appointment-cell/src/services/memory.rs
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use shared_database::DatabaseError;

use crate::models::{Appointment, AppointmentPatch, AppointmentQuery, BlockedTimeRange, NewAppointment};
use crate::services::catalog::SlotTime;
use crate::services::store::{
    format_sequence, AppointmentStore, BlockedRangeStore, SequenceAllocator, ACTIVE_SLOT_CONSTRAINT,
    NUMBER_CONSTRAINT,
};

/// Process-local appointment store. Uniqueness is checked and the row written
/// under one lock, matching what the database indexes guarantee.
#[derive(Default)]
pub struct InMemoryAppointmentStore {
    rows: Mutex<Vec<Appointment>>,
    blocked: Mutex<Vec<BlockedTimeRange>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_blocked_range(&self, range: BlockedTimeRange) {
        self.blocked.lock().await.push(range);
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    fn slot_taken(rows: &[Appointment], date: NaiveDate, time: SlotTime, except: Option<Uuid>) -> bool {
        rows.iter().any(|row| {
            Some(row.id) != except
                && row.occupies_slot()
                && row.preferred_date == date
                && row.preferred_time == time
        })
    }

    fn slot_violation(date: NaiveDate, time: SlotTime) -> DatabaseError {
        DatabaseError::UniqueViolation {
            constraint: Some(ACTIVE_SLOT_CONSTRAINT.to_string()),
            message: format!("slot {} {} is already taken", date, time),
        }
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn insert(&self, appointment: NewAppointment) -> Result<Appointment, DatabaseError> {
        let mut rows = self.rows.lock().await;

        if appointment.status.is_active()
            && Self::slot_taken(&rows, appointment.preferred_date, appointment.preferred_time, None)
        {
            return Err(Self::slot_violation(appointment.preferred_date, appointment.preferred_time));
        }
        if rows.iter().any(|row| row.appointment_number == appointment.appointment_number) {
            return Err(DatabaseError::UniqueViolation {
                constraint: Some(NUMBER_CONSTRAINT.to_string()),
                message: format!("appointment number {} already exists", appointment.appointment_number),
            });
        }

        let now = Utc::now();
        let row = Appointment {
            id: Uuid::new_v4(),
            appointment_number: appointment.appointment_number,
            patient_id: appointment.patient_id,
            demographics: appointment.demographics,
            preferred_date: appointment.preferred_date,
            preferred_time: appointment.preferred_time,
            reason_for_visit: appointment.reason_for_visit,
            status: appointment.status,
            contact_number: appointment.contact_number,
            address: appointment.address,
            created_at: now,
            updated_at: now,
        };
        rows.push(row.clone());
        Ok(row)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, DatabaseError> {
        Ok(self.rows.lock().await.iter().find(|row| row.id == id).cloned())
    }

    async fn find_active_at(
        &self,
        date: NaiveDate,
        time: SlotTime,
    ) -> Result<Option<Appointment>, DatabaseError> {
        Ok(self
            .rows
            .lock()
            .await
            .iter()
            .find(|row| row.occupies_slot() && row.preferred_date == date && row.preferred_time == time)
            .cloned())
    }

    async fn list_active_for_date(&self, date: NaiveDate) -> Result<Vec<Appointment>, DatabaseError> {
        let mut active: Vec<Appointment> = self
            .rows
            .lock()
            .await
            .iter()
            .filter(|row| row.occupies_slot() && row.preferred_date == date)
            .cloned()
            .collect();
        active.sort_by_key(|row| row.preferred_time);
        Ok(active)
    }

    async fn list(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>, DatabaseError> {
        let mut matching: Vec<Appointment> = self
            .rows
            .lock()
            .await
            .iter()
            .filter(|row| query.matches(row))
            .cloned()
            .collect();
        matching.sort_by_key(|row| (row.preferred_date, row.preferred_time));
        Ok(matching
            .into_iter()
            .skip(query.effective_skip())
            .take(query.effective_limit())
            .collect())
    }

    async fn update(&self, id: Uuid, patch: &AppointmentPatch) -> Result<Option<Appointment>, DatabaseError> {
        let mut rows = self.rows.lock().await;

        let Some(index) = rows.iter().position(|row| row.id == id) else {
            return Ok(None);
        };

        let mut updated = rows[index].clone();
        patch.apply(&mut updated);
        if updated.occupies_slot()
            && Self::slot_taken(&rows, updated.preferred_date, updated.preferred_time, Some(id))
        {
            return Err(Self::slot_violation(updated.preferred_date, updated.preferred_time));
        }

        updated.updated_at = Utc::now();
        rows[index] = updated.clone();
        Ok(Some(updated))
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Appointment>, DatabaseError> {
        let mut rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .position(|row| row.id == id)
            .map(|index| rows.remove(index)))
    }
}

#[async_trait]
impl BlockedRangeStore for InMemoryAppointmentStore {
    async fn active_ranges_covering(&self, date: NaiveDate) -> Result<Vec<BlockedTimeRange>, DatabaseError> {
        Ok(self
            .blocked
            .lock()
            .await
            .iter()
            .filter(|range| range.covers(date))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemorySequenceAllocator {
    counters: Mutex<HashMap<String, u64>>,
}

impl InMemorySequenceAllocator {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SequenceAllocator for InMemorySequenceAllocator {
    async fn next(&self, key: &str) -> Result<String, DatabaseError> {
        let mut counters = self.counters.lock().await;
        let value = counters.entry(key.to_string()).or_insert(0);
        *value += 1;
        Ok(format_sequence(*value))
    }
}
