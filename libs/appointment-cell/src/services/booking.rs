// libs/appointment-cell/src/services/booking.rs
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{FixedOffset, NaiveDate, NaiveDateTime};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::{AppConfig, ClinicScheduleConfig};
use shared_database::{DatabaseError, SupabaseClient};

use crate::models::{
    Appointment, AppointmentError, AppointmentQuery, AppointmentStatus, AvailableSlotsResponse,
    CreateAppointmentRequest, UpdateAppointmentRequest, UpdateAppointmentResponse, AppointmentPatch,
};
use crate::services::availability::AvailabilityEngine;
use crate::services::catalog::{SlotTime, TimeSlotCatalog};
use crate::services::clock::{clinic_now, clinic_offset, Clock, SystemClock};
use crate::services::guard::BookingGuard;
use crate::services::hooks::{HookReport, LifecycleEvent, PostCommitHook};
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::memory::{InMemoryAppointmentStore, InMemorySequenceAllocator};
use crate::services::store::{AppointmentStore, BlockedRangeStore, SequenceAllocator, APPOINTMENT_SEQUENCE_KEY};
use crate::services::supabase::{SupabaseAppointmentStore, SupabaseSequenceAllocator};

fn db_error(e: DatabaseError) -> AppointmentError {
    AppointmentError::DatabaseError(e.to_string())
}

/// Everything the booking service talks to outside its own rules.
pub struct BookingDependencies {
    pub appointments: Arc<dyn AppointmentStore>,
    pub blocked_ranges: Arc<dyn BlockedRangeStore>,
    pub sequence: Arc<dyn SequenceAllocator>,
    pub clock: Arc<dyn Clock>,
    pub hooks: Vec<Arc<dyn PostCommitHook>>,
}

impl BookingDependencies {
    pub fn supabase(config: &AppConfig, hooks: Vec<Arc<dyn PostCommitHook>>) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        let store = Arc::new(SupabaseAppointmentStore::with_client(Arc::clone(&supabase)));
        Self {
            appointments: store.clone(),
            blocked_ranges: store,
            sequence: Arc::new(SupabaseSequenceAllocator::with_client(supabase)),
            clock: Arc::new(SystemClock),
            hooks,
        }
    }

    pub fn in_memory(
        store: Arc<InMemoryAppointmentStore>,
        clock: Arc<dyn Clock>,
        hooks: Vec<Arc<dyn PostCommitHook>>,
    ) -> Self {
        Self {
            appointments: store.clone(),
            blocked_ranges: store,
            sequence: Arc::new(InMemorySequenceAllocator::new()),
            clock,
            hooks,
        }
    }
}

pub struct AppointmentBookingService {
    appointments: Arc<dyn AppointmentStore>,
    blocked_ranges: Arc<dyn BlockedRangeStore>,
    sequence: Arc<dyn SequenceAllocator>,
    clock: Arc<dyn Clock>,
    hooks: Vec<Arc<dyn PostCommitHook>>,
    guard: BookingGuard,
    availability: AvailabilityEngine,
    lifecycle: AppointmentLifecycleService,
    offset: FixedOffset,
}

impl AppointmentBookingService {
    pub fn new(schedule: &ClinicScheduleConfig, deps: BookingDependencies) -> Self {
        let catalog = TimeSlotCatalog::from_schedule(schedule);

        Self {
            appointments: deps.appointments,
            blocked_ranges: deps.blocked_ranges,
            sequence: deps.sequence,
            clock: deps.clock,
            hooks: deps.hooks,
            guard: BookingGuard::new(catalog.clone(), schedule.booking_lead_days),
            availability: AvailabilityEngine::new(catalog, schedule.booking_lead_days),
            lifecycle: AppointmentLifecycleService::new(schedule.strict_status_transitions),
            offset: clinic_offset(schedule.utc_offset_minutes),
        }
    }

    pub fn catalog(&self) -> &TimeSlotCatalog {
        self.availability.catalog()
    }

    fn now_local(&self) -> NaiveDateTime {
        clinic_now(self.clock.as_ref(), self.offset)
    }

    /// Today's date at the clinic.
    pub fn today(&self) -> NaiveDate {
        self.now_local().date()
    }

    pub async fn create_appointment(
        &self,
        request: CreateAppointmentRequest,
        create_notification: bool,
    ) -> Result<Appointment, AppointmentError> {
        let draft = self.guard.validate_create(request)?;
        let (date, time) = (draft.preferred_date, draft.preferred_time);
        debug!("Booking request for {} {}", date, time);

        self.guard.check_lead_time(date, self.today())?;

        let blocked = self.blocked_ranges.active_ranges_covering(date).await.map_err(db_error)?;
        self.guard.check_blocked(date, &blocked)?;

        let existing = self.appointments.find_active_at(date, time).await.map_err(db_error)?;
        self.guard.check_not_taken(existing.as_ref(), date, time)?;

        let appointment_number = self.sequence.next(APPOINTMENT_SEQUENCE_KEY).await.map_err(db_error)?;

        let appointment = self
            .appointments
            .insert(draft.into_new_appointment(appointment_number))
            .await
            .map_err(|e| self.guard.map_write_error(e, date, time))?;

        info!(
            "Created appointment {} ({}) for {} {}",
            appointment.appointment_number, appointment.id, date, time
        );

        self.run_hooks(&LifecycleEvent::Created {
            appointment: appointment.clone(),
            create_notification,
        })
        .await;

        Ok(appointment)
    }

    pub async fn get_available_slots(&self, date: NaiveDate) -> Result<AvailableSlotsResponse, AppointmentError> {
        let appointments = self.appointments.list_active_for_date(date).await.map_err(db_error)?;
        let blocked = self.blocked_ranges.active_ranges_covering(date).await.map_err(db_error)?;

        let booked: HashSet<SlotTime> = appointments.iter().map(|a| a.preferred_time).collect();
        let day = self.availability.evaluate(date, &booked, &blocked, self.now_local());

        let mut time_slots: BTreeMap<SlotTime, Vec<Appointment>> = BTreeMap::new();
        for appointment in &appointments {
            time_slots
                .entry(appointment.preferred_time)
                .or_default()
                .push(appointment.clone());
        }

        debug!("{}: {:?}, {} appointments", date, day.day_status, appointments.len());

        Ok(AvailableSlotsResponse {
            date,
            total_appointments: appointments.len(),
            available_time_slots: day.available_times(),
            day_status: day.day_status,
            time_slots,
            slots: day.slots,
        })
    }

    pub async fn is_time_available(&self, date: NaiveDate, time: &str) -> Result<bool, AppointmentError> {
        let time = SlotTime::parse(time.trim()).map_err(|e| AppointmentError::ValidationError(e.to_string()))?;

        let existing = self.appointments.find_active_at(date, time).await.map_err(db_error)?;
        let blocked = self.blocked_ranges.active_ranges_covering(date).await.map_err(db_error)?;

        let booked: HashSet<SlotTime> = existing.map(|a| a.preferred_time).into_iter().collect();
        Ok(self.availability.is_time_available(date, time, &booked, &blocked, self.now_local()))
    }

    pub async fn get_appointment(&self, id: Uuid) -> Result<Appointment, AppointmentError> {
        self.appointments
            .find_by_id(id)
            .await
            .map_err(db_error)?
            .ok_or(AppointmentError::NotFound)
    }

    pub async fn list_appointments(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>, AppointmentError> {
        if let (Some(from), Some(to)) = (query.from_date, query.to_date) {
            if from > to {
                return Err(AppointmentError::ValidationError(
                    "from_date must not be after to_date".to_string(),
                ));
            }
        }
        self.appointments.list(query).await.map_err(db_error)
    }

    /// Full update, or with `is_status_update` only the `status` field of the
    /// request is applied. An SMS goes out after the write when the status changed.
    pub async fn update_appointment(
        &self,
        id: Uuid,
        request: UpdateAppointmentRequest,
        is_status_update: bool,
    ) -> Result<UpdateAppointmentResponse, AppointmentError> {
        let patch = if is_status_update {
            let status = request
                .status
                .ok_or_else(|| AppointmentError::ValidationError("status is required".to_string()))?;
            AppointmentPatch::status_only(status)
        } else {
            self.guard.validate_update(request)?
        };

        let current = self.get_appointment(id).await?;

        if let Some(new_status) = patch.status {
            self.lifecycle.validate_status_transition(current.status, new_status)?;
        }

        if patch.is_empty() {
            debug!("Nothing to update on appointment {}", id);
            return Ok(UpdateAppointmentResponse { appointment: current, sms_result: None });
        }

        let target_date = patch.preferred_date.unwrap_or(current.preferred_date);
        let target_time = patch.preferred_time.unwrap_or(current.preferred_time);

        let updated = self
            .appointments
            .update(id, &patch)
            .await
            .map_err(|e| self.guard.map_write_error(e, target_date, target_time))?
            .ok_or(AppointmentError::NotFound)?;

        info!("Updated appointment {}", id);

        let sms_result = if current.status != updated.status {
            let event = LifecycleEvent::StatusChanged {
                appointment: updated.clone(),
                old_status: current.status,
                new_status: updated.status,
            };
            self.run_hooks(&event).await.into_iter().find_map(|report| match report {
                HookReport::Sms(result) => Some(result),
                _ => None,
            })
        } else {
            None
        };

        Ok(UpdateAppointmentResponse { appointment: updated, sms_result })
    }

    pub async fn update_status(
        &self,
        id: Uuid,
        status: AppointmentStatus,
    ) -> Result<UpdateAppointmentResponse, AppointmentError> {
        let request = UpdateAppointmentRequest {
            status: Some(status),
            ..UpdateAppointmentRequest::default()
        };
        self.update_appointment(id, request, true).await
    }

    /// Hard delete, outside the status rules. The appointment number is not reused.
    pub async fn delete_appointment(&self, id: Uuid) -> Result<Appointment, AppointmentError> {
        let deleted = self
            .appointments
            .delete(id)
            .await
            .map_err(db_error)?
            .ok_or(AppointmentError::NotFound)?;
        info!("Deleted appointment {} ({})", deleted.appointment_number, id);
        Ok(deleted)
    }

    async fn run_hooks(&self, event: &LifecycleEvent) -> Vec<HookReport> {
        let mut reports = Vec::with_capacity(self.hooks.len());
        for hook in &self.hooks {
            let report = hook.on_event(event).await;
            debug!("Hook {} reported {:?}", hook.name(), report);
            reports.push(report);
        }
        reports
    }
}
