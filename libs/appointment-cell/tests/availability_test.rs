use std::collections::HashSet;
use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use uuid::Uuid;

use appointment_cell::models::{
    AppointmentStatus, BlockReason, BlockedTimeRange, CreateAppointmentRequest, DayStatus, Demographics,
    SlotState,
};
use appointment_cell::services::{
    AppointmentBookingService, AvailabilityEngine, BookingDependencies, FixedClock, InMemoryAppointmentStore,
    SlotTime, TimeSlotCatalog,
};
use shared_config::ClinicScheduleConfig;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn t(raw: &str) -> SlotTime {
    SlotTime::parse(raw).unwrap()
}

fn engine() -> AvailabilityEngine {
    AvailabilityEngine::new(TimeSlotCatalog::default(), 2)
}

fn holiday(start: NaiveDate, end: NaiveDate) -> BlockedTimeRange {
    BlockedTimeRange {
        id: Uuid::new_v4(),
        start_date: start,
        end_date: end,
        is_active: true,
        reason: BlockReason::Holiday,
        custom_reason: Some("Founding anniversary".to_string()),
    }
}

fn booking(preferred_date: NaiveDate, time: &str) -> CreateAppointmentRequest {
    CreateAppointmentRequest {
        patient_id: None,
        demographics: Demographics {
            first_name: "Maria".to_string(),
            last_name: "Santos".to_string(),
            ..Demographics::default()
        },
        preferred_date,
        preferred_time: time.to_string(),
        reason_for_visit: "Routine check-up".to_string(),
        contact_number: Some("09171234567".to_string()),
        address: None,
    }
}

fn service_at(now: DateTime<Utc>) -> (AppointmentBookingService, Arc<InMemoryAppointmentStore>, Arc<FixedClock>) {
    let store = Arc::new(InMemoryAppointmentStore::new());
    let clock = Arc::new(FixedClock::new(now));
    let service = AppointmentBookingService::new(
        &ClinicScheduleConfig::default(),
        BookingDependencies::in_memory(store.clone(), clock.clone(), Vec::new()),
    );
    (service, store, clock)
}

#[test]
fn test_two_bookings_leave_sixteen_slots() {
    let day = date(2025, 3, 10);
    let now = date(2025, 3, 1).and_hms_opt(9, 0, 0).unwrap();
    let booked: HashSet<SlotTime> = [t("09:00"), t("13:30")].into_iter().collect();

    let availability = engine().evaluate(day, &booked, &[], now);
    let available = availability.available_times();

    assert_eq!(available.len(), 16);
    assert!(!available.contains(&t("09:00")));
    assert!(!available.contains(&t("13:30")));
    assert_eq!(availability.day_status, DayStatus::Open);

    let booked_labels: Vec<&str> = availability
        .slots
        .iter()
        .filter(|slot| slot.state == SlotState::Booked)
        .map(|slot| slot.label.as_str())
        .collect();
    assert_eq!(booked_labels, vec!["9:00 AM (Booked)", "1:30 PM (Booked)"]);
}

#[test]
fn test_elapsed_slots_today_are_passed() {
    let today = date(2025, 3, 10);
    let now = today.and_time(NaiveTime::from_hms_opt(10, 0, 0).unwrap());

    let availability = engine().evaluate(today, &HashSet::new(), &[], now);
    let state_of = |time: &str| {
        availability
            .slots
            .iter()
            .find(|slot| slot.time == t(time))
            .map(|slot| slot.state)
    };

    assert_eq!(state_of("09:30"), Some(SlotState::Passed));
    assert_eq!(state_of("10:00"), Some(SlotState::Passed));
    assert_eq!(state_of("10:30"), Some(SlotState::Available));
    assert!(engine().is_time_available(today, t("10:30"), &HashSet::new(), &[], now));
    assert!(!engine().is_time_available(today, t("09:30"), &HashSet::new(), &[], now));
}

#[test]
fn test_available_slots_never_booked_or_passed() {
    let today = date(2025, 3, 10);
    let now = today.and_time(NaiveTime::from_hms_opt(13, 15, 0).unwrap());
    let booked: HashSet<SlotTime> = [t("14:00"), t("16:30"), t("08:00")].into_iter().collect();

    for day in [today, date(2025, 3, 11), date(2025, 3, 12)] {
        for slot in engine().evaluate(day, &booked, &[], now).slots {
            if slot.is_available() {
                assert!(!booked.contains(&slot.time));
                assert!(day != today || day.and_time(slot.time.as_naive()) > now);
            }
        }
    }
}

#[test]
fn test_blocked_date_is_distinct_from_fully_booked() {
    let day = date(2025, 3, 10);
    let now = date(2025, 3, 1).and_hms_opt(9, 0, 0).unwrap();
    let ranges = vec![holiday(date(2025, 3, 9), date(2025, 3, 10))];

    let blocked = engine().evaluate(day, &HashSet::new(), &ranges, now);
    assert!(blocked.available_times().is_empty());
    assert_matches!(blocked.day_status, DayStatus::Blocked { ref reason } if reason == "Founding anniversary");

    let everything: HashSet<SlotTime> = TimeSlotCatalog::default().all_slots().collect();
    let full = engine().evaluate(day, &everything, &[], now);
    assert!(full.available_times().is_empty());
    assert_eq!(full.day_status, DayStatus::FullyBooked);
}

#[test]
fn test_inactive_range_does_not_block() {
    let day = date(2025, 3, 10);
    let now = date(2025, 3, 1).and_hms_opt(9, 0, 0).unwrap();
    let mut range = holiday(day, day);
    range.is_active = false;

    let availability = engine().evaluate(day, &HashSet::new(), &[range], now);
    assert_eq!(availability.available_times().len(), 18);
}

#[test]
fn test_day_status_reports_lead_time() {
    let today = date(2025, 3, 10);
    let now = today.and_hms_opt(7, 0, 0).unwrap();

    let tomorrow = engine().evaluate(date(2025, 3, 11), &HashSet::new(), &[], now);
    assert_eq!(tomorrow.day_status, DayStatus::TooSoon { earliest_date: date(2025, 3, 12) });
    assert_eq!(tomorrow.available_times().len(), 18);

    let later = engine().evaluate(date(2025, 3, 12), &HashSet::new(), &[], now);
    assert_eq!(later.day_status, DayStatus::Open);
}

#[tokio::test]
async fn test_service_groups_appointments_by_time() {
    let (service, _store, _clock) = service_at(Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap());
    let day = date(2025, 3, 10);

    service.create_appointment(booking(day, "09:00"), false).await.unwrap();
    let cancelled = service.create_appointment(booking(day, "13:30"), false).await.unwrap();
    service.create_appointment(booking(day, "13:30"), false).await.unwrap_err();
    service.update_status(cancelled.id, AppointmentStatus::Cancelled).await.unwrap();
    service.create_appointment(booking(day, "13:30"), false).await.unwrap();

    let response = service.get_available_slots(day).await.unwrap();

    assert_eq!(response.total_appointments, 2);
    assert_eq!(response.available_time_slots.len(), 16);
    assert_eq!(response.time_slots.get(&t("13:30")).map(Vec::len), Some(1));
    assert_eq!(response.time_slots.get(&t("09:00")).map(Vec::len), Some(1));
    assert_eq!(response.slots.len(), 18);
}

#[tokio::test]
async fn test_service_reports_blocked_day() {
    let (service, store, _clock) = service_at(Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap());
    let day = date(2025, 3, 10);
    store.add_blocked_range(holiday(day, day)).await;

    let response = service.get_available_slots(day).await.unwrap();

    assert!(response.available_time_slots.is_empty());
    assert_matches!(response.day_status, DayStatus::Blocked { .. });
    assert!(!service.is_time_available(day, "10:00").await.unwrap());
}

#[tokio::test]
async fn test_is_time_available_follows_clock() {
    let (service, _store, clock) = service_at(Utc.with_ymd_and_hms(2025, 3, 10, 9, 45, 0).unwrap());
    let today = date(2025, 3, 10);

    assert!(service.is_time_available(today, "10:00").await.unwrap());
    clock.set(Utc.with_ymd_and_hms(2025, 3, 10, 10, 0, 0).unwrap());
    assert!(!service.is_time_available(today, "10:00").await.unwrap());
    assert!(service.is_time_available(today, "25:00").await.is_err());
}
