//! slotwise — double-booking prevention and availability resolution for
//! barbershop appointment books.
//!
//! The crate is a library core with no network surface of its own: HTTP
//! handlers construct the stores and a [`BookingCoordinator`] at startup and
//! call into it from concurrently running request workers. Whether a slot is
//! bookable combines three kinds of facts (recurring weekly windows, dated
//! special overrides, approved time off) with a scan over existing
//! appointments expanded by their buffer times. Mutations use optimistic
//! versioning plus an in-store overlap constraint as the final gate, with a
//! bounded, backoff-paced retry loop around transient losers.

pub mod booking;
pub mod limits;
pub mod model;
pub mod observability;
pub mod retry;
pub mod store;

pub use booking::{
    AvailabilityResolver, BlockedBy, BookingChanges, BookingCoordinator, BookingError,
    ClosedReason, ConflictDetector, Openness,
};
pub use model::{
    Appointment, AppointmentId, AppointmentStatus, BarberId, BookingRequest, ClientId, DayWindow,
    EntryId, Slot, SpecialAvailability, SpecialKind, TimeOff, TimeOffStatus, Version,
    WeeklyAvailability,
};
pub use retry::{RetryPolicy, Sleeper, TokioSleeper};
pub use store::{AppointmentStore, AvailabilityStore, DaySchedule, StoreError, WriteRejection};
