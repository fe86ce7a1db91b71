use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::RwLock;

use crate::model::*;

/// Why a versioned commit was refused. Returned as a value so every call site
/// handles the conflict branch explicitly — control flow never rides on
/// exceptions.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteRejection {
    NotFound(AppointmentId),
    /// The row moved under the caller; `actual` is the version now stored.
    VersionMismatch { expected: Version, actual: Version },
    /// The overlap constraint fired inside the write lock — the authoritative
    /// final gate against races that slipped past the application checks.
    OverlapConstraint(Vec<Appointment>),
}

impl std::fmt::Display for WriteRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteRejection::NotFound(id) => write!(f, "appointment not found: {id}"),
            WriteRejection::VersionMismatch { expected, actual } => {
                write!(f, "version mismatch: expected {expected}, stored {actual}")
            }
            WriteRejection::OverlapConstraint(conflicts) => {
                write!(f, "overlap constraint: {} conflicting appointment(s)", conflicts.len())
            }
        }
    }
}

impl std::error::Error for WriteRejection {}

/// One barber's appointment book, sorted by `start_time`.
#[derive(Debug, Default)]
struct BarberBook {
    appointments: Vec<Appointment>,
    /// Bumped on every committed write. Lets callers tell "nothing changed
    /// since my last look" from "someone moved under me".
    generation: u64,
}

impl BarberBook {
    fn insert_sorted(&mut self, appt: Appointment) {
        let pos = self
            .appointments
            .partition_point(|a| a.start_time <= appt.start_time);
        self.appointments.insert(pos, appt);
    }

    fn position(&self, id: AppointmentId) -> Option<usize> {
        self.appointments.iter().position(|a| a.id == id)
    }

    /// Occupying rows whose effective interval overlaps `query`.
    fn occupying_overlapping(
        &self,
        query: &Slot,
        exclude: Option<AppointmentId>,
    ) -> Vec<Appointment> {
        self.appointments
            .iter()
            .filter(|a| Some(a.id) != exclude)
            .filter(|a| a.status.is_occupying())
            .filter(|a| a.effective_slot().overlaps(query))
            .cloned()
            .collect()
    }
}

type SharedBook = Arc<RwLock<BarberBook>>;

/// The appointment table, scoped by barber. The only shared mutable resource
/// in the core — all mutation goes through [`insert`](Self::insert) and
/// [`commit_versioned`](Self::commit_versioned), each one atomic under the
/// barber's write lock.
pub struct AppointmentStore {
    books: DashMap<BarberId, SharedBook>,
    /// Reverse lookup: appointment id → barber id.
    index: DashMap<AppointmentId, BarberId>,
}

impl Default for AppointmentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AppointmentStore {
    pub fn new() -> Self {
        Self {
            books: DashMap::new(),
            index: DashMap::new(),
        }
    }

    fn book(&self, barber_id: BarberId) -> SharedBook {
        self.books
            .entry(barber_id)
            .or_insert_with(|| Arc::new(RwLock::new(BarberBook::default())))
            .value()
            .clone()
    }

    /// Insert a new appointment at `version = 1`. The overlap re-check runs
    /// inside the write lock, so two racing inserts for the same barber can
    /// never both commit; `Err` carries the rows that tripped the constraint.
    pub async fn insert(&self, mut appt: Appointment) -> Result<Appointment, Vec<Appointment>> {
        let book = self.book(appt.barber_id);
        let mut guard = book.write().await;
        if appt.status.is_occupying() {
            let conflicts = guard.occupying_overlapping(&appt.effective_slot(), None);
            if !conflicts.is_empty() {
                return Err(conflicts);
            }
        }
        appt.version = 1;
        self.index.insert(appt.id, appt.barber_id);
        guard.insert_sorted(appt.clone());
        guard.generation += 1;
        Ok(appt)
    }

    /// Replace the row with `updated` iff the stored version equals
    /// `expected`. On success the stored version becomes `expected + 1`.
    /// Occupying rows are re-checked against the overlap constraint; the
    /// barber of a row never changes.
    pub async fn commit_versioned(
        &self,
        id: AppointmentId,
        expected: Version,
        mut updated: Appointment,
    ) -> Result<Appointment, WriteRejection> {
        let barber_id = self
            .index
            .get(&id)
            .map(|e| *e.value())
            .ok_or(WriteRejection::NotFound(id))?;
        debug_assert_eq!(updated.barber_id, barber_id);
        let book = self.book(barber_id);
        let mut guard = book.write().await;
        let pos = guard.position(id).ok_or(WriteRejection::NotFound(id))?;
        let actual = guard.appointments[pos].version;
        if actual != expected {
            return Err(WriteRejection::VersionMismatch { expected, actual });
        }
        if updated.status.is_occupying() {
            let conflicts = guard.occupying_overlapping(&updated.effective_slot(), Some(id));
            if !conflicts.is_empty() {
                return Err(WriteRejection::OverlapConstraint(conflicts));
            }
        }
        updated.id = id;
        updated.version = actual + 1;
        guard.appointments.remove(pos);
        guard.insert_sorted(updated.clone());
        guard.generation += 1;
        Ok(updated)
    }

    pub async fn get(&self, id: AppointmentId) -> Option<Appointment> {
        let barber_id = *self.index.get(&id)?.value();
        let book = self.books.get(&barber_id)?.value().clone();
        let guard = book.read().await;
        guard.position(id).map(|pos| guard.appointments[pos].clone())
    }

    /// Occupying appointments for a barber whose effective interval overlaps
    /// the query slot, optionally skipping one id (move-this-appointment
    /// checks).
    pub async fn occupying_within(
        &self,
        barber_id: BarberId,
        query: Slot,
        exclude: Option<AppointmentId>,
    ) -> Vec<Appointment> {
        let Some(entry) = self.books.get(&barber_id) else {
            return Vec::new();
        };
        let book = entry.value().clone();
        drop(entry);
        let guard = book.read().await;
        guard.occupying_overlapping(&query, exclude)
    }

    /// Current write generation for a barber's book. Any committed write
    /// bumps it, so an unchanged value means nothing moved.
    pub async fn generation(&self, barber_id: BarberId) -> u64 {
        let Some(entry) = self.books.get(&barber_id) else {
            return 0;
        };
        let book = entry.value().clone();
        drop(entry);
        let guard = book.read().await;
        guard.generation
    }
}
