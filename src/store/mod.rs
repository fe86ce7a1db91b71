//! In-memory reference implementation of the persistence contracts the
//! booking core consumes: availability facts and the appointment book.
//! All serialization happens inside per-barber write locks — the appointment
//! store's in-lock overlap re-check plays the role of the database-level
//! exclusion constraint, the final gate against races.

mod appointments;
mod availability;

pub use appointments::{AppointmentStore, WriteRejection};
pub use availability::{AvailabilityStore, DaySchedule, StoreError};
