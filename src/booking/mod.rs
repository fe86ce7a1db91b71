//! The scheduling core: availability resolution, conflict detection and the
//! booking transaction coordinator.

mod availability;
mod conflict;
mod coordinator;
mod error;

pub use availability::{AvailabilityResolver, ClosedReason, Openness, resolve_window};
pub use conflict::{ConflictDetector, conflicts_with};
pub use coordinator::{BookingChanges, BookingCoordinator};
pub use error::{BlockedBy, BookingError};
