use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Weekday};
use dashmap::DashMap;
use tokio::sync::RwLock;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

/// Store-level validation failures. Non-retryable, surfaced as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No row with this id scoped to this barber.
    NotFound { id: EntryId, barber_id: BarberId },
    /// A non-cancelled time-off row already covers part of the date range.
    TimeOffOverlap { existing: EntryId },
    LimitExceeded(&'static str),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound { id, barber_id } => {
                write!(f, "not found: {id} for barber {barber_id}")
            }
            StoreError::TimeOffOverlap { existing } => {
                write!(f, "time off overlaps existing request {existing}")
            }
            StoreError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Everything the resolver needs to know about one barber on one date.
#[derive(Debug, Clone, Default)]
pub struct DaySchedule {
    /// Active weekly rows for the date's weekday.
    pub weekly: Vec<WeeklyAvailability>,
    /// Special rows for the exact date.
    pub special: Vec<SpecialAvailability>,
    /// Approved time-off rows covering the date.
    pub time_off: Vec<TimeOff>,
}

#[derive(Debug, Default)]
struct BarberSchedule {
    weekly: Vec<WeeklyAvailability>,
    special: Vec<SpecialAvailability>,
    time_off: Vec<TimeOff>,
}

/// Holds the three kinds of availability facts per barber. Pure data access —
/// the only business rules here are the write-time uniqueness invariants.
pub struct AvailabilityStore {
    schedules: DashMap<BarberId, Arc<RwLock<BarberSchedule>>>,
}

impl Default for AvailabilityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AvailabilityStore {
    pub fn new() -> Self {
        Self {
            schedules: DashMap::new(),
        }
    }

    fn schedule(&self, barber_id: BarberId) -> Arc<RwLock<BarberSchedule>> {
        self.schedules
            .entry(barber_id)
            .or_insert_with(|| Arc::new(RwLock::new(BarberSchedule::default())))
            .value()
            .clone()
    }

    // ── Weekly availability ──────────────────────────────────

    /// Upsert semantics: a new row for the same weekday deactivates any prior
    /// active row, so at most one active row per (barber, weekday) remains.
    pub async fn set_weekly(
        &self,
        barber_id: BarberId,
        weekday: Weekday,
        window: DayWindow,
    ) -> WeeklyAvailability {
        let schedule = self.schedule(barber_id);
        let mut guard = schedule.write().await;
        for row in guard.weekly.iter_mut() {
            if row.weekday == weekday && row.is_active {
                row.is_active = false;
            }
        }
        let row = WeeklyAvailability {
            id: Ulid::new(),
            barber_id,
            weekday,
            window,
            is_active: true,
        };
        guard.weekly.push(row.clone());
        row
    }

    pub async fn remove_weekly(
        &self,
        barber_id: BarberId,
        id: EntryId,
    ) -> Result<WeeklyAvailability, StoreError> {
        let schedule = self.schedule(barber_id);
        let mut guard = schedule.write().await;
        let pos = guard
            .weekly
            .iter()
            .position(|r| r.id == id)
            .ok_or(StoreError::NotFound { id, barber_id })?;
        Ok(guard.weekly.remove(pos))
    }

    // ── Special availability ─────────────────────────────────

    pub async fn add_special(
        &self,
        barber_id: BarberId,
        date: NaiveDate,
        window: DayWindow,
        kind: SpecialKind,
        notes: Option<String>,
    ) -> Result<SpecialAvailability, StoreError> {
        if notes.as_ref().is_some_and(|n| n.len() > MAX_NOTES_LEN) {
            return Err(StoreError::LimitExceeded("notes too long"));
        }
        let schedule = self.schedule(barber_id);
        let mut guard = schedule.write().await;
        let row = SpecialAvailability {
            id: Ulid::new(),
            barber_id,
            date,
            window,
            kind,
            notes,
        };
        guard.special.push(row.clone());
        Ok(row)
    }

    pub async fn remove_special(
        &self,
        barber_id: BarberId,
        id: EntryId,
    ) -> Result<SpecialAvailability, StoreError> {
        let schedule = self.schedule(barber_id);
        let mut guard = schedule.write().await;
        let pos = guard
            .special
            .iter()
            .position(|r| r.id == id)
            .ok_or(StoreError::NotFound { id, barber_id })?;
        Ok(guard.special.remove(pos))
    }

    // ── Time off ─────────────────────────────────────────────

    /// Creates a `Requested` row. Rejected when any non-cancelled row for the
    /// same barber overlaps the date range.
    pub async fn request_time_off(
        &self,
        barber_id: BarberId,
        start_date: NaiveDate,
        end_date: NaiveDate,
        window: Option<DayWindow>,
        reason: Option<String>,
    ) -> Result<TimeOff, StoreError> {
        if end_date < start_date {
            return Err(StoreError::LimitExceeded("time off end date before start date"));
        }
        if (end_date - start_date).num_days() + 1 > MAX_TIME_OFF_DAYS {
            return Err(StoreError::LimitExceeded("time off range too long"));
        }
        if reason.as_ref().is_some_and(|r| r.len() > MAX_NOTES_LEN) {
            return Err(StoreError::LimitExceeded("reason too long"));
        }
        let row = TimeOff {
            id: Ulid::new(),
            barber_id,
            start_date,
            end_date,
            window,
            status: TimeOffStatus::Requested,
            reason,
        };
        let schedule = self.schedule(barber_id);
        let mut guard = schedule.write().await;
        if let Some(existing) = guard
            .time_off
            .iter()
            .find(|r| r.status != TimeOffStatus::Cancelled && r.dates_overlap(&row))
        {
            return Err(StoreError::TimeOffOverlap { existing: existing.id });
        }
        guard.time_off.push(row.clone());
        Ok(row)
    }

    /// Approve or cancel a request. Overlap was enforced at creation, so no
    /// re-check is needed here.
    pub async fn set_time_off_status(
        &self,
        barber_id: BarberId,
        id: EntryId,
        status: TimeOffStatus,
    ) -> Result<TimeOff, StoreError> {
        let schedule = self.schedule(barber_id);
        let mut guard = schedule.write().await;
        let row = guard
            .time_off
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound { id, barber_id })?;
        row.status = status;
        Ok(row.clone())
    }

    // ── Reads ────────────────────────────────────────────────

    /// Snapshot of the facts relevant to one barber on one date.
    pub async fn schedule_for(&self, barber_id: BarberId, date: NaiveDate) -> DaySchedule {
        let Some(entry) = self.schedules.get(&barber_id) else {
            return DaySchedule::default();
        };
        let schedule = entry.value().clone();
        drop(entry);
        let guard = schedule.read().await;
        DaySchedule {
            weekly: guard
                .weekly
                .iter()
                .filter(|r| r.is_active && r.weekday == date.weekday())
                .cloned()
                .collect(),
            special: guard
                .special
                .iter()
                .filter(|r| r.date == date)
                .cloned()
                .collect(),
            time_off: guard
                .time_off
                .iter()
                .filter(|r| r.is_enforced() && r.covers(date))
                .cloned()
                .collect(),
        }
    }
}
