use crate::model::*;

use super::availability::ClosedReason;

/// What a concurrent modification ran into when the coordinator re-applied
/// the caller's change against fresh state.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockedBy {
    Availability(ClosedReason),
    Conflicts(Vec<Appointment>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum BookingError {
    /// Request failed validation before any store access. Non-retryable.
    InvalidRequest(&'static str),
    NotFound(AppointmentId),
    /// The requested window is not open per the resolver. Non-retryable.
    OutsideAvailability(ClosedReason),
    /// An overlapping active appointment blocks the slot and did not move
    /// across retries.
    SchedulingConflict { conflicts: Vec<Appointment> },
    /// The row changed under the caller and the re-applied change no longer
    /// passes availability/conflict checks.
    ConcurrentModification {
        appointment_id: AppointmentId,
        blocked_by: BlockedBy,
    },
    /// Retry budget exhausted; carries the last known conflicting
    /// appointment(s) for diagnostics. Fatal, never silently dropped.
    RetriesExhausted {
        attempts: u32,
        last_conflicts: Vec<Appointment>,
    },
}

impl std::fmt::Display for BookingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookingError::InvalidRequest(msg) => write!(f, "invalid request: {msg}"),
            BookingError::NotFound(id) => write!(f, "appointment not found: {id}"),
            BookingError::OutsideAvailability(reason) => {
                write!(f, "requested time is not open: {reason}")
            }
            BookingError::SchedulingConflict { conflicts } => {
                write!(f, "slot conflicts with {} active appointment(s)", conflicts.len())
            }
            BookingError::ConcurrentModification { appointment_id, blocked_by } => {
                write!(f, "appointment {appointment_id} was modified concurrently; ")?;
                match blocked_by {
                    BlockedBy::Availability(reason) => {
                        write!(f, "re-applying the change failed: {reason}")
                    }
                    BlockedBy::Conflicts(conflicts) => write!(
                        f,
                        "re-applying the change conflicts with {} appointment(s)",
                        conflicts.len()
                    ),
                }
            }
            BookingError::RetriesExhausted { attempts, last_conflicts } => write!(
                f,
                "gave up after {attempts} attempt(s); last seen {} conflicting appointment(s)",
                last_conflicts.len()
            ),
        }
    }
}

impl std::error::Error for BookingError {}
