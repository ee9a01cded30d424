// libs/appointment-cell/src/services/catalog.rs
use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use shared_config::ClinicScheduleConfig;

/// A bookable time of day, exchanged as a 24-hour `"HH:MM"` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotTime(NaiveTime);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is not a valid HH:MM time")]
pub struct InvalidSlotTime(pub String);

impl SlotTime {
    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(SlotTime)
    }

    /// Strict `"HH:MM"` parser (two-digit hour and minute).
    pub fn parse(raw: &str) -> Result<Self, InvalidSlotTime> {
        let invalid = || InvalidSlotTime(raw.to_string());
        let (hour, minute) = raw.split_once(':').ok_or_else(invalid)?;
        if hour.len() != 2 || minute.len() != 2 {
            return Err(invalid());
        }
        let hour: u32 = hour.parse().map_err(|_| invalid())?;
        let minute: u32 = minute.parse().map_err(|_| invalid())?;
        Self::from_hm(hour, minute).ok_or_else(invalid)
    }

    pub fn as_naive(&self) -> NaiveTime {
        self.0
    }

    /// `"h:MM AM"` / `"h:MM PM"`.
    pub fn to_12_hour(&self) -> String {
        let hour = self.0.hour();
        let suffix = if hour < 12 { "AM" } else { "PM" };
        let hour12 = match hour % 12 {
            0 => 12,
            h => h,
        };
        format!("{}:{:02} {}", hour12, self.0.minute(), suffix)
    }

    /// Inverse of [`to_12_hour`](Self::to_12_hour).
    pub fn from_12_hour(label: &str) -> Option<Self> {
        let (clock, suffix) = label.trim().split_once(' ')?;
        let (hour, minute) = clock.split_once(':')?;
        if minute.len() != 2 {
            return None;
        }
        let hour: u32 = hour.parse().ok()?;
        let minute: u32 = minute.parse().ok()?;
        if !(1..=12).contains(&hour) {
            return None;
        }
        let hour24 = match suffix.to_ascii_uppercase().as_str() {
            "AM" => hour % 12,
            "PM" => hour % 12 + 12,
            _ => return None,
        };
        Self::from_hm(hour24, minute)
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0.hour(), self.0.minute())
    }
}

impl FromStr for SlotTime {
    type Err = InvalidSlotTime;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for SlotTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SlotTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        // Postgres `time` columns come back as HH:MM:SS.
        let trimmed = match raw.len() {
            8 if raw.ends_with(":00") => &raw[..5],
            _ => raw.as_str(),
        };
        SlotTime::parse(trimmed).map_err(serde::de::Error::custom)
    }
}

/// 24-hour label to 12-hour label.
pub fn to_12_hour(time: SlotTime) -> String {
    time.to_12_hour()
}

/// 12-hour label to 24-hour value.
pub fn to_24_hour(label: &str) -> Option<SlotTime> {
    SlotTime::from_12_hour(label)
}

/// The fixed set of bookable times in a clinic day.
#[derive(Debug, Clone)]
pub struct TimeSlotCatalog {
    opening: NaiveTime,
    closing: NaiveTime,
    step_minutes: u32,
}

impl TimeSlotCatalog {
    pub fn new(opening: NaiveTime, closing: NaiveTime, step_minutes: u32) -> Self {
        Self {
            opening,
            closing,
            step_minutes: step_minutes.max(1),
        }
    }

    pub fn from_schedule(schedule: &ClinicScheduleConfig) -> Self {
        Self::new(schedule.opening_time, schedule.closing_time, schedule.slot_minutes)
    }

    /// Slots from opening (inclusive) to closing (exclusive). Each call
    /// starts a fresh iteration.
    pub fn all_slots(&self) -> Slots {
        Slots {
            next: Some(self.opening),
            closing: self.closing,
            step: Duration::minutes(i64::from(self.step_minutes)),
        }
    }

    pub fn contains(&self, time: SlotTime) -> bool {
        let t = time.as_naive();
        if t < self.opening || t >= self.closing {
            return false;
        }
        let offset = (t - self.opening).num_minutes();
        offset % i64::from(self.step_minutes) == 0
    }

    pub fn len(&self) -> usize {
        self.all_slots().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TimeSlotCatalog {
    fn default() -> Self {
        Self::from_schedule(&ClinicScheduleConfig::default())
    }
}

pub struct Slots {
    next: Option<NaiveTime>,
    closing: NaiveTime,
    step: Duration,
}

impl Iterator for Slots {
    type Item = SlotTime;

    fn next(&mut self) -> Option<SlotTime> {
        let current = self.next.filter(|t| *t < self.closing)?;
        let (advanced, wrapped) = current.overflowing_add_signed(self.step);
        self.next = (wrapped == 0).then_some(advanced);
        Some(SlotTime(current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_strict() {
        assert_eq!(SlotTime::parse("09:30").unwrap().to_string(), "09:30");
        assert!(SlotTime::parse("9:30").is_err());
        assert!(SlotTime::parse("24:00").is_err());
        assert!(SlotTime::parse("09:60").is_err());
        assert!(SlotTime::parse("0930").is_err());
    }

    #[test]
    fn test_twelve_hour_edges() {
        assert_eq!(SlotTime::parse("00:30").unwrap().to_12_hour(), "12:30 AM");
        assert_eq!(SlotTime::parse("08:00").unwrap().to_12_hour(), "8:00 AM");
        assert_eq!(SlotTime::parse("12:00").unwrap().to_12_hour(), "12:00 PM");
        assert_eq!(SlotTime::parse("13:30").unwrap().to_12_hour(), "1:30 PM");
        assert_eq!(SlotTime::parse("23:59").unwrap().to_12_hour(), "11:59 PM");
    }

    #[test]
    fn test_from_12_hour_rejects_garbage() {
        assert_eq!(to_24_hour("12:00 AM"), SlotTime::from_hm(0, 0));
        assert_eq!(to_24_hour("1:05 pm"), SlotTime::from_hm(13, 5));
        assert_eq!(to_24_hour("13:00 PM"), None);
        assert_eq!(to_24_hour("0:30 AM"), None);
        assert_eq!(to_24_hour("9:30"), None);
        assert_eq!(to_24_hour("9:3 AM"), None);
    }

    #[test]
    fn test_deserialize_accepts_postgres_time() {
        let time: SlotTime = serde_json::from_str("\"14:30:00\"").unwrap();
        assert_eq!(time.to_string(), "14:30");
        assert!(serde_json::from_str::<SlotTime>("\"14:30:15\"").is_err());
    }

    #[test]
    fn test_iteration_stops_at_midnight() {
        let catalog = TimeSlotCatalog::new(
            NaiveTime::from_hms_opt(23, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(23, 59, 0).unwrap(),
            30,
        );
        let labels: Vec<String> = catalog.all_slots().map(|s| s.to_string()).collect();
        assert_eq!(labels, vec!["23:00", "23:30"]);
    }
}
