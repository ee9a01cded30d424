// libs/appointment-cell/src/services/availability.rs
use std::collections::HashSet;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::debug;

use crate::models::{BlockedTimeRange, DayStatus, SlotAvailability, SlotState};
use crate::services::catalog::{SlotTime, TimeSlotCatalog};
use crate::services::guard::earliest_bookable_date;

/// Slot-by-slot view of one date plus the reason the date is or isn't open.
#[derive(Debug, Clone, PartialEq)]
pub struct DayAvailability {
    pub date: NaiveDate,
    pub day_status: DayStatus,
    pub slots: Vec<SlotAvailability>,
}

impl DayAvailability {
    pub fn available_times(&self) -> Vec<SlotTime> {
        self.slots
            .iter()
            .filter(|slot| slot.is_available())
            .map(|slot| slot.time)
            .collect()
    }

    pub fn has_available_slot(&self) -> bool {
        self.slots.iter().any(SlotAvailability::is_available)
    }
}

/// Pure availability rules. Callers load booked slots and blocked ranges and
/// pass the clinic's local wall-clock time.
#[derive(Debug, Clone)]
pub struct AvailabilityEngine {
    catalog: TimeSlotCatalog,
    lead_days: u32,
}

impl AvailabilityEngine {
    pub fn new(catalog: TimeSlotCatalog, lead_days: u32) -> Self {
        Self { catalog, lead_days }
    }

    pub fn catalog(&self) -> &TimeSlotCatalog {
        &self.catalog
    }

    /// Only slots on today's date can pass; a slot starting exactly now has passed.
    pub fn is_passed(date: NaiveDate, time: SlotTime, now: NaiveDateTime) -> bool {
        date == now.date() && date.and_time(time.as_naive()) <= now
    }

    pub fn is_blocked(date: NaiveDate, blocked: &[BlockedTimeRange]) -> Option<&BlockedTimeRange> {
        blocked.iter().find(|range| range.covers(date))
    }

    pub fn slot_state(
        date: NaiveDate,
        time: SlotTime,
        booked: &HashSet<SlotTime>,
        now: NaiveDateTime,
    ) -> SlotState {
        if booked.contains(&time) {
            SlotState::Booked
        } else if Self::is_passed(date, time, now) {
            SlotState::Passed
        } else {
            SlotState::Available
        }
    }

    pub fn evaluate(
        &self,
        date: NaiveDate,
        booked: &HashSet<SlotTime>,
        blocked: &[BlockedTimeRange],
        now: NaiveDateTime,
    ) -> DayAvailability {
        if let Some(range) = Self::is_blocked(date, blocked) {
            debug!("{} is blocked: {}", date, range.display_reason());
            return DayAvailability {
                date,
                day_status: DayStatus::Blocked { reason: range.display_reason() },
                slots: Vec::new(),
            };
        }

        let slots: Vec<SlotAvailability> = self
            .catalog
            .all_slots()
            .map(|time| SlotAvailability::new(time, Self::slot_state(date, time, booked, now)))
            .collect();

        let earliest_date = earliest_bookable_date(now.date(), self.lead_days);
        let day_status = if date < earliest_date {
            DayStatus::TooSoon { earliest_date }
        } else if !slots.iter().any(SlotAvailability::is_available) {
            DayStatus::FullyBooked
        } else {
            DayStatus::Open
        };

        DayAvailability { date, day_status, slots }
    }

    /// Single-slot form of [`evaluate`](Self::evaluate). Times outside the
    /// catalog are never available.
    pub fn is_time_available(
        &self,
        date: NaiveDate,
        time: SlotTime,
        booked: &HashSet<SlotTime>,
        blocked: &[BlockedTimeRange],
        now: NaiveDateTime,
    ) -> bool {
        self.catalog.contains(time)
            && Self::is_blocked(date, blocked).is_none()
            && Self::slot_state(date, time, booked, now) == SlotState::Available
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn t(raw: &str) -> SlotTime {
        SlotTime::parse(raw).unwrap()
    }

    fn at(date: NaiveDate, hour: u32, minute: u32) -> NaiveDateTime {
        date.and_time(NaiveTime::from_hms_opt(hour, minute, 0).unwrap())
    }

    #[test]
    fn test_slot_starting_now_has_passed() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 5).unwrap();
        assert!(AvailabilityEngine::is_passed(today, t("10:00"), at(today, 10, 0)));
        assert!(!AvailabilityEngine::is_passed(today, t("10:30"), at(today, 10, 0)));
        let tomorrow = today.succ_opt().unwrap();
        assert!(!AvailabilityEngine::is_passed(tomorrow, t("08:00"), at(today, 23, 59)));
    }

    #[test]
    fn test_booked_wins_over_passed() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 5).unwrap();
        let booked: HashSet<SlotTime> = [t("09:00")].into_iter().collect();
        assert_eq!(
            AvailabilityEngine::slot_state(today, t("09:00"), &booked, at(today, 12, 0)),
            SlotState::Booked
        );
    }

    #[test]
    fn test_time_outside_catalog_is_unavailable() {
        let engine = AvailabilityEngine::new(TimeSlotCatalog::default(), 2);
        let date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let now = at(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(), 8, 0);
        assert!(!engine.is_time_available(date, t("17:00"), &HashSet::new(), &[], now));
        assert!(!engine.is_time_available(date, t("09:15"), &HashSet::new(), &[], now));
        assert!(engine.is_time_available(date, t("16:30"), &HashSet::new(), &[], now));
    }
}
