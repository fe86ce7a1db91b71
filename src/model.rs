use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Barber identity — owned by the external user subsystem, opaque here.
pub type BarberId = i64;
/// Client identity — external, opaque here.
pub type ClientId = i64;
pub type AppointmentId = Ulid;
/// Id for availability rows (weekly / special / time off).
pub type EntryId = Ulid;
/// Optimistic-concurrency token on mutable bookings.
pub type Version = u64;

/// Half-open absolute interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Slot {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        debug_assert!(start < end, "Slot start must be before end");
        Self { start, end }
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    pub fn overlaps(&self, other: &Slot) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Half-open time-of-day window `[start, end)` within a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl DayWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        debug_assert!(start < end, "DayWindow start must be before end");
        Self { start, end }
    }

    pub fn overlaps(&self, other: &DayWindow) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains(&self, other: &DayWindow) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Pending,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    /// Statuses that occupy the barber's time for conflict purposes.
    pub fn is_occupying(&self) -> bool {
        matches!(self, Self::Scheduled | Self::Confirmed | Self::Pending)
    }
}

/// A booked service. Never hard-deleted in normal operation — cancellation is
/// a status transition so the row keeps its history and its version chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub barber_id: BarberId,
    pub client_id: ClientId,
    pub start_time: NaiveDateTime,
    pub duration_minutes: u32,
    /// Setup padding in minutes before the service starts.
    pub buffer_before: u32,
    /// Cleanup padding in minutes after the service ends.
    pub buffer_after: u32,
    pub status: AppointmentStatus,
    pub version: Version,
    pub price: Option<f64>,
}

impl Appointment {
    pub fn date(&self) -> NaiveDate {
        self.start_time.date()
    }

    /// The core service interval, buffers excluded.
    pub fn service_slot(&self) -> Slot {
        Slot::new(
            self.start_time,
            self.start_time + Duration::minutes(i64::from(self.duration_minutes)),
        )
    }

    /// The effective occupied interval:
    /// `[start − buffer_before, start + duration + buffer_after)`.
    pub fn effective_slot(&self) -> Slot {
        Slot::new(
            self.start_time - Duration::minutes(i64::from(self.buffer_before)),
            self.start_time
                + Duration::minutes(i64::from(self.duration_minutes + self.buffer_after)),
        )
    }

    /// The unbuffered service window as a time-of-day range. `None` when the
    /// service runs past midnight.
    pub fn service_window(&self) -> Option<DayWindow> {
        let end = self.start_time + Duration::minutes(i64::from(self.duration_minutes));
        if end.date() != self.date() {
            return None;
        }
        Some(DayWindow::new(self.start_time.time(), end.time()))
    }
}

/// Recurring weekly opening hours. At most one active row per
/// (barber, weekday) is authoritative — the store enforces upsert semantics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyAvailability {
    pub id: EntryId,
    pub barber_id: BarberId,
    pub weekday: Weekday,
    pub window: DayWindow,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialKind {
    /// Opens an otherwise-closed window on this date.
    Available,
    /// Closes an otherwise-open window on this date.
    Unavailable,
}

/// One-off per-date override of the weekly schedule. Multiple rows may exist
/// for one date covering different sub-ranges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialAvailability {
    pub id: EntryId,
    pub barber_id: BarberId,
    pub date: NaiveDate,
    pub window: DayWindow,
    pub kind: SpecialKind,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOffStatus {
    Requested,
    Approved,
    Cancelled,
}

/// A time-off request over an inclusive date range. `window = None` means the
/// whole day is off. Only approved rows are enforced by the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeOff {
    pub id: EntryId,
    pub barber_id: BarberId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub window: Option<DayWindow>,
    pub status: TimeOffStatus,
    pub reason: Option<String>,
}

impl TimeOff {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    pub fn is_full_day(&self) -> bool {
        self.window.is_none()
    }

    pub fn is_enforced(&self) -> bool {
        self.status == TimeOffStatus::Approved
    }

    /// Inclusive date-range overlap with another request.
    pub fn dates_overlap(&self, other: &TimeOff) -> bool {
        self.start_date <= other.end_date && other.start_date <= self.end_date
    }
}

/// Input to `BookingCoordinator::create_booking`, as handed over by the
/// (external) HTTP layer.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingRequest {
    pub barber_id: BarberId,
    pub client_id: ClientId,
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub duration_minutes: u32,
    pub buffer_before: u32,
    pub buffer_after: u32,
    pub price: Option<f64>,
}

impl BookingRequest {
    pub fn start_time(&self) -> NaiveDateTime {
        self.date.and_time(self.start)
    }

    /// The core service interval, buffers excluded.
    pub fn service_slot(&self) -> Slot {
        Slot::new(
            self.start_time(),
            self.start_time() + Duration::minutes(i64::from(self.duration_minutes)),
        )
    }

    /// The buffer-expanded interval used for conflict detection.
    pub fn effective_slot(&self) -> Slot {
        Slot::new(
            self.start_time() - Duration::minutes(i64::from(self.buffer_before)),
            self.start_time()
                + Duration::minutes(i64::from(self.duration_minutes + self.buffer_after)),
        )
    }

    /// The unbuffered window as a time-of-day range for availability checks.
    /// `None` when the service would run past midnight.
    pub fn service_window(&self) -> Option<DayWindow> {
        let end = self.start_time() + Duration::minutes(i64::from(self.duration_minutes));
        if end.date() != self.date {
            return None;
        }
        Some(DayWindow::new(self.start, end.time()))
    }
}
