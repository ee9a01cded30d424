use std::collections::HashSet;
use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use futures::future::join_all;
use uuid::Uuid;

use appointment_cell::models::{
    AppointmentError, AppointmentQuery, AppointmentStatus, BlockReason, BlockedTimeRange,
    CreateAppointmentRequest, Demographics, ParentInfo, UpdateAppointmentRequest,
};
use appointment_cell::services::{
    AppointmentBookingService, BookingDependencies, FixedClock, InMemoryAppointmentStore, SlotTime,
};
use shared_config::ClinicScheduleConfig;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
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
        reason_for_visit: "Persistent cough".to_string(),
        contact_number: Some("0917 123 4567".to_string()),
        address: Some("12 Mabini St".to_string()),
    }
}

fn service_with(
    schedule: ClinicScheduleConfig,
    now: DateTime<Utc>,
) -> (Arc<AppointmentBookingService>, Arc<InMemoryAppointmentStore>) {
    let store = Arc::new(InMemoryAppointmentStore::new());
    let service = AppointmentBookingService::new(
        &schedule,
        BookingDependencies::in_memory(store.clone(), Arc::new(FixedClock::new(now)), Vec::new()),
    );
    (Arc::new(service), store)
}

// Wednesday morning, 5 March 2025.
fn service() -> (Arc<AppointmentBookingService>, Arc<InMemoryAppointmentStore>) {
    service_with(
        ClinicScheduleConfig::default(),
        Utc.with_ymd_and_hms(2025, 3, 5, 8, 30, 0).unwrap(),
    )
}

#[tokio::test]
async fn test_new_appointment_starts_pending_with_number() {
    let (service, _store) = service();

    let appointment = service
        .create_appointment(booking(date(2025, 3, 7), "09:00"), false)
        .await
        .unwrap();

    assert_eq!(appointment.status, AppointmentStatus::Pending);
    assert_eq!(appointment.appointment_number, "000001");
    assert_eq!(appointment.preferred_time.to_string(), "09:00");
    assert_eq!(appointment.contact_number.as_deref(), Some("09171234567"));
}

#[tokio::test]
async fn test_lead_time_boundary() {
    let (service, store) = service();

    let tomorrow = service.create_appointment(booking(date(2025, 3, 6), "09:00"), false).await;
    assert_matches!(
        tomorrow,
        Err(AppointmentError::LeadTimeViolation { earliest_date, .. }) if earliest_date == date(2025, 3, 7)
    );
    let today = service.create_appointment(booking(date(2025, 3, 5), "16:30"), false).await;
    assert_matches!(today, Err(AppointmentError::LeadTimeViolation { .. }));

    let day_after = service.create_appointment(booking(date(2025, 3, 7), "08:00"), false).await;
    assert!(day_after.is_ok());
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_lead_time_uses_clinic_local_date() {
    // 20:00 UTC on the 4th is already the 5th at UTC+8.
    let schedule = ClinicScheduleConfig {
        utc_offset_minutes: 8 * 60,
        ..ClinicScheduleConfig::default()
    };
    let (service, _store) = service_with(schedule, Utc.with_ymd_and_hms(2025, 3, 4, 20, 0, 0).unwrap());

    assert_eq!(service.today(), date(2025, 3, 5));
    let result = service.create_appointment(booking(date(2025, 3, 6), "09:00"), false).await;
    assert_matches!(result, Err(AppointmentError::LeadTimeViolation { .. }));
}

#[tokio::test]
async fn test_double_booking_is_rejected_with_slot_named() {
    let (service, _store) = service();
    service.create_appointment(booking(date(2025, 3, 7), "10:30"), false).await.unwrap();

    let second = service.create_appointment(booking(date(2025, 3, 7), "10:30"), false).await;

    let err = second.unwrap_err();
    assert_matches!(err, AppointmentError::SlotConflict { .. });
    let message = err.to_string();
    assert!(message.contains("2025-03-07"));
    assert!(message.contains("10:30"));
}

#[tokio::test]
async fn test_concurrent_bookings_for_one_slot_yield_one_winner() {
    let (service, store) = service();

    let attempts = (0..8).map(|_| {
        let service = Arc::clone(&service);
        async move { service.create_appointment(booking(date(2025, 3, 10), "14:00"), false).await }
    });
    let results = join_all(attempts).await;

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    for result in results.iter().filter(|r| r.is_err()) {
        assert_matches!(result, Err(AppointmentError::SlotConflict { .. }));
    }
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_concurrent_bookings_get_distinct_numbers() {
    let (service, _store) = service();
    let times = ["08:00", "08:30", "09:00", "09:30", "10:00", "10:30", "11:00", "11:30"];

    let attempts = times.iter().map(|time| {
        let service = Arc::clone(&service);
        async move { service.create_appointment(booking(date(2025, 3, 10), time), false).await }
    });
    let numbers: HashSet<String> = join_all(attempts)
        .await
        .into_iter()
        .map(|r| r.unwrap().appointment_number)
        .collect();

    assert_eq!(numbers.len(), times.len());
}

#[tokio::test]
async fn test_cancelled_appointment_frees_its_slot() {
    let (service, _store) = service();
    let first = service.create_appointment(booking(date(2025, 3, 7), "11:00"), false).await.unwrap();

    service.update_status(first.id, AppointmentStatus::Cancelled).await.unwrap();
    let second = service.create_appointment(booking(date(2025, 3, 7), "11:00"), false).await.unwrap();

    assert_ne!(first.id, second.id);

    // Restoring the cancelled one would double-book the slot.
    let restore = service.update_status(first.id, AppointmentStatus::Pending).await;
    assert_matches!(restore, Err(AppointmentError::SlotConflict { .. }));
}

#[tokio::test]
async fn test_moving_into_a_taken_slot_conflicts() {
    let (service, _store) = service();
    service.create_appointment(booking(date(2025, 3, 7), "09:00"), false).await.unwrap();
    let other = service.create_appointment(booking(date(2025, 3, 7), "09:30"), false).await.unwrap();

    let request = UpdateAppointmentRequest {
        preferred_time: Some("09:00".to_string()),
        ..UpdateAppointmentRequest::default()
    };
    let moved = service.update_appointment(other.id, request, false).await;

    assert_matches!(moved, Err(AppointmentError::SlotConflict { time, .. }) if time.to_string() == "09:00");
}

#[tokio::test]
async fn test_numbers_are_not_reused_after_delete() {
    let (service, _store) = service();
    let first = service.create_appointment(booking(date(2025, 3, 7), "09:00"), false).await.unwrap();

    let deleted = service.delete_appointment(first.id).await.unwrap();
    assert_eq!(deleted.id, first.id);
    assert_matches!(service.get_appointment(first.id).await, Err(AppointmentError::NotFound));
    assert_matches!(service.delete_appointment(first.id).await, Err(AppointmentError::NotFound));

    let second = service.create_appointment(booking(date(2025, 3, 7), "09:00"), false).await.unwrap();
    assert_eq!(second.appointment_number, "000002");
}

#[tokio::test]
async fn test_blocked_date_is_rejected_with_reason() {
    let (service, store) = service();
    store
        .add_blocked_range(BlockedTimeRange {
            id: Uuid::new_v4(),
            start_date: date(2025, 3, 10),
            end_date: date(2025, 3, 14),
            is_active: true,
            reason: BlockReason::Maintenance,
            custom_reason: None,
        })
        .await;

    let result = service.create_appointment(booking(date(2025, 3, 12), "09:00"), false).await;

    assert_matches!(result, Err(AppointmentError::DateBlocked { ref reason, .. }) if reason == "Clinic maintenance");
}

#[tokio::test]
async fn test_field_validation() {
    let (service, _store) = service();
    let day = date(2025, 3, 7);

    let mut short_reason = booking(day, "09:00");
    short_reason.reason_for_visit = " ache ".to_string();
    let mut no_name = booking(day, "09:00");
    no_name.demographics.first_name = "  ".to_string();
    let mut bad_phone = booking(day, "09:00");
    bad_phone.contact_number = Some("12-34".to_string());
    let off_grid = booking(day, "09:15");
    let after_hours = booking(day, "17:00");
    let malformed = booking(day, "9am");

    for request in [short_reason, no_name, bad_phone, off_grid, after_hours, malformed] {
        let result = service.create_appointment(request, false).await;
        assert_matches!(result, Err(AppointmentError::ValidationError(_)));
    }
}

#[tokio::test]
async fn test_empty_parent_info_is_dropped() {
    let (service, _store) = service();
    let mut request = booking(date(2025, 3, 7), "09:00");
    request.demographics.mother_info = Some(ParentInfo {
        name: Some("Ana Santos".to_string()),
        age: None,
        occupation: None,
    });
    request.demographics.father_info = Some(ParentInfo::default());

    let appointment = service.create_appointment(request, false).await.unwrap();

    assert!(appointment.demographics.mother_info.is_some());
    assert!(appointment.demographics.father_info.is_none());
}

#[tokio::test]
async fn test_full_update_leaves_unspecified_fields() {
    let (service, _store) = service();
    let created = service.create_appointment(booking(date(2025, 3, 7), "09:00"), false).await.unwrap();

    let request = UpdateAppointmentRequest {
        reason_for_visit: Some("Follow-up on cough".to_string()),
        preferred_date: Some(date(2025, 3, 8)),
        ..UpdateAppointmentRequest::default()
    };
    let response = service.update_appointment(created.id, request, false).await.unwrap();

    let updated = response.appointment;
    assert_eq!(updated.reason_for_visit, "Follow-up on cough");
    assert_eq!(updated.preferred_date, date(2025, 3, 8));
    assert_eq!(updated.preferred_time, created.preferred_time);
    assert_eq!(updated.demographics.first_name, "Maria");
    assert_eq!(updated.status, AppointmentStatus::Pending);
    assert!(response.sms_result.is_none());
}

#[tokio::test]
async fn test_full_update_skips_blank_strings() {
    let (service, _store) = service();
    let created = service.create_appointment(booking(date(2025, 3, 7), "09:00"), false).await.unwrap();

    let request = UpdateAppointmentRequest {
        first_name: Some(String::new()),
        last_name: Some("   ".to_string()),
        reason_for_visit: Some("Follow up visit".to_string()),
        address: Some("".to_string()),
        ..UpdateAppointmentRequest::default()
    };
    let updated = service.update_appointment(created.id, request, false).await.unwrap().appointment;

    assert_eq!(updated.demographics.first_name, "Maria");
    assert_eq!(updated.demographics.last_name, "Santos");
    assert_eq!(updated.reason_for_visit, "Follow up visit");
    assert_eq!(updated.address.as_deref(), Some("12 Mabini St"));

    let blank_reason = UpdateAppointmentRequest {
        reason_for_visit: Some(" ".to_string()),
        ..UpdateAppointmentRequest::default()
    };
    let unchanged = service.update_appointment(created.id, blank_reason, false).await.unwrap().appointment;
    assert_eq!(unchanged.reason_for_visit, "Follow up visit");
}

#[tokio::test]
async fn test_status_only_update_ignores_other_fields() {
    let (service, _store) = service();
    let created = service.create_appointment(booking(date(2025, 3, 7), "09:00"), false).await.unwrap();

    let request = UpdateAppointmentRequest {
        status: Some(AppointmentStatus::Scheduled),
        reason_for_visit: Some("Something else entirely".to_string()),
        ..UpdateAppointmentRequest::default()
    };
    let updated = service.update_appointment(created.id, request, true).await.unwrap().appointment;

    assert_eq!(updated.status, AppointmentStatus::Scheduled);
    assert_eq!(updated.reason_for_visit, "Persistent cough");

    let missing = service
        .update_appointment(created.id, UpdateAppointmentRequest::default(), true)
        .await;
    assert_matches!(missing, Err(AppointmentError::ValidationError(_)));
}

#[tokio::test]
async fn test_list_filters_sorts_and_pages() {
    let (service, _store) = service();
    let patient = Uuid::new_v4();

    for (day, time) in [(8, "10:00"), (7, "15:00"), (7, "09:00"), (9, "08:00")] {
        let mut request = booking(date(2025, 3, day), time);
        if day != 9 {
            request.patient_id = Some(patient);
        }
        service.create_appointment(request, false).await.unwrap();
    }

    let mine = service
        .list_appointments(&AppointmentQuery { patient_id: Some(patient), ..AppointmentQuery::default() })
        .await
        .unwrap();
    let order: Vec<(NaiveDate, SlotTime)> = mine.iter().map(|a| (a.preferred_date, a.preferred_time)).collect();
    assert_eq!(
        order,
        vec![
            (date(2025, 3, 7), SlotTime::parse("09:00").unwrap()),
            (date(2025, 3, 7), SlotTime::parse("15:00").unwrap()),
            (date(2025, 3, 8), SlotTime::parse("10:00").unwrap()),
        ]
    );

    let page = service
        .list_appointments(&AppointmentQuery { skip: Some(1), limit: Some(2), ..AppointmentQuery::default() })
        .await
        .unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].preferred_time.to_string(), "15:00");

    let ranged = service
        .list_appointments(&AppointmentQuery {
            from_date: Some(date(2025, 3, 8)),
            to_date: Some(date(2025, 3, 9)),
            ..AppointmentQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(ranged.len(), 2);

    let inverted = service
        .list_appointments(&AppointmentQuery {
            from_date: Some(date(2025, 3, 9)),
            to_date: Some(date(2025, 3, 8)),
            ..AppointmentQuery::default()
        })
        .await;
    assert_matches!(inverted, Err(AppointmentError::ValidationError(_)));
}
