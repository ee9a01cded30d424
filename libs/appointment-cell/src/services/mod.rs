pub mod availability;
pub mod booking;
pub mod catalog;
pub mod clock;
pub mod guard;
pub mod hooks;
pub mod lifecycle;
pub mod memory;
pub mod store;
pub mod supabase;

pub use availability::{AvailabilityEngine, DayAvailability};
pub use booking::{AppointmentBookingService, BookingDependencies};
pub use catalog::{SlotTime, TimeSlotCatalog};
pub use clock::{Clock, FixedClock, SystemClock};
pub use guard::BookingGuard;
pub use hooks::{CreationNotificationHook, HookReport, LifecycleEvent, PostCommitHook, SmsStatusHook};
pub use lifecycle::AppointmentLifecycleService;
pub use memory::{InMemoryAppointmentStore, InMemorySequenceAllocator};
pub use store::{AppointmentStore, BlockedRangeStore, SequenceAllocator};
pub use supabase::{SupabaseAppointmentStore, SupabaseSequenceAllocator};
