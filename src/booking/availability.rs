use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::*;
use crate::store::{AvailabilityStore, DaySchedule};

/// Why the barber is closed for a requested window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosedReason {
    /// An approved time-off row covers the window (or the whole day).
    TimeOff,
    /// A special `unavailable` row covers the window.
    SpecialUnavailable,
    /// No weekly (or special `available`) window fully covers the request.
    OutsideWeeklyHours,
}

impl std::fmt::Display for ClosedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClosedReason::TimeOff => write!(f, "barber has approved time off"),
            ClosedReason::SpecialUnavailable => {
                write!(f, "barber is specially marked unavailable")
            }
            ClosedReason::OutsideWeeklyHours => write!(f, "outside the barber's working hours"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Openness {
    Open,
    Closed(ClosedReason),
}

impl Openness {
    pub fn is_open(&self) -> bool {
        matches!(self, Openness::Open)
    }
}

/// Decide whether the barber is open for business over `window`, given a
/// snapshot of that date's facts. Precedence, highest first:
///
/// 1. approved full-day time off → closed
/// 2. approved time off whose window overlaps the request → closed
/// 3. special `unavailable` row containing the request → closed
/// 4. special `available` row containing the request → open (weekly skipped)
/// 5. active weekly row containing the request → open
/// 6. otherwise closed
///
/// Availability windows must FULLY contain the request — a partially covered
/// request counts as closed, the caller should ask for a sub-window. Time off
/// uses plain overlap instead; a lunch-hour block closes any request touching
/// it. Appointment buffers never enter this check.
pub fn resolve_window(day: &DaySchedule, window: &DayWindow) -> Openness {
    for off in &day.time_off {
        match off.window {
            None => return Openness::Closed(ClosedReason::TimeOff),
            Some(blocked) if blocked.overlaps(window) => {
                return Openness::Closed(ClosedReason::TimeOff);
            }
            Some(_) => {}
        }
    }

    for special in &day.special {
        if special.kind == SpecialKind::Unavailable && special.window.contains(window) {
            return Openness::Closed(ClosedReason::SpecialUnavailable);
        }
    }
    for special in &day.special {
        if special.kind == SpecialKind::Available && special.window.contains(window) {
            return Openness::Open;
        }
    }

    for weekly in &day.weekly {
        if weekly.is_active && weekly.window.contains(window) {
            return Openness::Open;
        }
    }

    Openness::Closed(ClosedReason::OutsideWeeklyHours)
}

/// Answers "is the barber theoretically open for business at this time?" by
/// combining weekly hours, special-day overrides and time-off exclusions.
pub struct AvailabilityResolver {
    store: Arc<AvailabilityStore>,
}

impl AvailabilityResolver {
    pub fn new(store: Arc<AvailabilityStore>) -> Self {
        Self { store }
    }

    pub async fn resolve(
        &self,
        barber_id: BarberId,
        date: NaiveDate,
        window: DayWindow,
    ) -> Openness {
        let day = self.store.schedule_for(barber_id, date).await;
        resolve_window(&day, &window)
    }

    pub async fn is_open(
        &self,
        barber_id: BarberId,
        date: NaiveDate,
        window: DayWindow,
    ) -> bool {
        self.resolve(barber_id, date, window).await.is_open()
    }
}
