use std::sync::Arc;
use std::time::Instant;

use chrono::{NaiveDate, NaiveTime};
use tracing::{debug, warn};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability;
use crate::retry::{RetryPolicy, Sleeper, TokioSleeper};
use crate::store::{AppointmentStore, AvailabilityStore, WriteRejection};

use super::availability::{AvailabilityResolver, Openness};
use super::conflict::ConflictDetector;
use super::error::{BlockedBy, BookingError};

/// Partial update applied to an existing appointment. `None` fields keep the
/// stored value; `price: Some(None)` clears the price.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookingChanges {
    pub start: Option<(NaiveDate, NaiveTime)>,
    pub duration_minutes: Option<u32>,
    pub buffer_before: Option<u32>,
    pub buffer_after: Option<u32>,
    pub price: Option<Option<f64>>,
}

impl BookingChanges {
    fn apply_to(&self, current: &Appointment) -> Appointment {
        let mut updated = current.clone();
        if let Some((date, time)) = self.start {
            updated.start_time = date.and_time(time);
        }
        if let Some(duration) = self.duration_minutes {
            updated.duration_minutes = duration;
        }
        if let Some(before) = self.buffer_before {
            updated.buffer_before = before;
        }
        if let Some(after) = self.buffer_after {
            updated.buffer_after = after;
        }
        if let Some(price) = self.price {
            updated.price = price;
        }
        updated
    }
}

/// Orchestrates availability resolution, conflict detection and the versioned
/// store write for every booking mutation. One coordinator instance is shared
/// by all request workers; it keeps no per-request state, so concurrent calls
/// only contend on the store's per-barber locks.
///
/// Retryable failures (constraint rejections, version mismatches, conflicts
/// that are still moving) are re-attempted with exponential backoff up to the
/// policy budget; everything else propagates to the caller as a typed error.
pub struct BookingCoordinator {
    resolver: AvailabilityResolver,
    detector: ConflictDetector,
    appointments: Arc<AppointmentStore>,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl BookingCoordinator {
    pub fn new(
        availability: Arc<AvailabilityStore>,
        appointments: Arc<AppointmentStore>,
    ) -> Self {
        Self::with_policy(
            availability,
            appointments,
            RetryPolicy::default(),
            Arc::new(TokioSleeper),
        )
    }

    pub fn with_policy(
        availability: Arc<AvailabilityStore>,
        appointments: Arc<AppointmentStore>,
        policy: RetryPolicy,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            resolver: AvailabilityResolver::new(availability),
            detector: ConflictDetector::new(appointments.clone()),
            appointments,
            policy,
            sleeper,
        }
    }

    // ── Create ───────────────────────────────────────────────

    pub async fn create_booking(
        &self,
        request: BookingRequest,
    ) -> Result<Appointment, BookingError> {
        let started = Instant::now();
        let result = self.create_inner(&request).await;
        record_outcome("create", started, &result);
        result
    }

    async fn create_inner(
        &self,
        request: &BookingRequest,
    ) -> Result<Appointment, BookingError> {
        let window = validate_request(request)?;
        let effective = request.effective_slot();

        let mut last_conflicts: Vec<Appointment> = Vec::new();
        // Conflict fingerprint from the previous attempt: if neither the
        // conflicting ids nor the book generation moved, nobody is making
        // progress and the conflict is terminal.
        let mut last_seen: Option<(u64, Vec<AppointmentId>)> = None;

        for attempt in 0..self.policy.max_attempts() {
            if attempt > 0 {
                metrics::counter!(observability::BOOKING_RETRIES_TOTAL).increment(1);
                self.sleeper.sleep(self.policy.backoff(attempt - 1)).await;
            }

            // Availability is checked on the unbuffered window: buffers may
            // fall outside opening hours, the core service time may not.
            if let Openness::Closed(reason) = self
                .resolver
                .resolve(request.barber_id, request.date, window)
                .await
            {
                return Err(BookingError::OutsideAvailability(reason));
            }

            let conflicts = self
                .detector
                .find_conflicts(request.barber_id, effective, None)
                .await;
            if !conflicts.is_empty() {
                metrics::counter!(observability::CONFLICTS_DETECTED_TOTAL).increment(1);
                let generation = self.appointments.generation(request.barber_id).await;
                let ids: Vec<AppointmentId> = conflicts.iter().map(|a| a.id).collect();
                if last_seen
                    .as_ref()
                    .is_some_and(|(g, prev)| *g == generation && *prev == ids)
                {
                    debug!(
                        barber = request.barber_id,
                        "conflict did not move between attempts, giving up"
                    );
                    return Err(BookingError::SchedulingConflict { conflicts });
                }
                debug!(
                    barber = request.barber_id,
                    conflicts = conflicts.len(),
                    attempt,
                    "slot contended, will re-check"
                );
                last_seen = Some((generation, ids));
                last_conflicts = conflicts;
                continue;
            }
            last_seen = None;

            let candidate = Appointment {
                id: Ulid::new(),
                barber_id: request.barber_id,
                client_id: request.client_id,
                start_time: request.start_time(),
                duration_minutes: request.duration_minutes,
                buffer_before: request.buffer_before,
                buffer_after: request.buffer_after,
                status: AppointmentStatus::Scheduled,
                version: 0,
                price: request.price,
            };
            match self.appointments.insert(candidate).await {
                Ok(created) => {
                    debug!(
                        barber = request.barber_id,
                        appointment = %created.id,
                        attempt,
                        "booking created"
                    );
                    return Ok(created);
                }
                // The constraint caught a race the detector missed — our
                // local picture is stale, re-run from the top.
                Err(conflicts) => {
                    metrics::counter!(observability::CONSTRAINT_REJECTIONS_TOTAL).increment(1);
                    debug!(
                        barber = request.barber_id,
                        attempt, "insert lost the race at the overlap constraint"
                    );
                    last_conflicts = conflicts;
                }
            }
        }

        warn!(
            barber = request.barber_id,
            attempts = self.policy.max_attempts(),
            "booking retry budget exhausted"
        );
        metrics::counter!(observability::RETRIES_EXHAUSTED_TOTAL).increment(1);
        Err(BookingError::RetriesExhausted {
            attempts: self.policy.max_attempts(),
            last_conflicts,
        })
    }

    // ── Update ───────────────────────────────────────────────

    /// Re-applies `changes` on top of the freshest row when the version moved
    /// under the caller; reports `ConcurrentModification` only when the fresh
    /// state no longer admits the change.
    pub async fn update_booking(
        &self,
        appointment_id: AppointmentId,
        expected_version: Version,
        changes: BookingChanges,
    ) -> Result<Appointment, BookingError> {
        let started = Instant::now();
        let result = self
            .update_inner(appointment_id, expected_version, &changes)
            .await;
        record_outcome("update", started, &result);
        result
    }

    async fn update_inner(
        &self,
        appointment_id: AppointmentId,
        expected_version: Version,
        changes: &BookingChanges,
    ) -> Result<Appointment, BookingError> {
        let mut expected = expected_version;
        let mut adopted_newer = false;
        let mut last_conflicts: Vec<Appointment> = Vec::new();

        for attempt in 0..self.policy.max_attempts() {
            if attempt > 0 {
                metrics::counter!(observability::BOOKING_RETRIES_TOTAL).increment(1);
                self.sleeper.sleep(self.policy.backoff(attempt - 1)).await;
            }

            let current = self
                .appointments
                .get(appointment_id)
                .await
                .ok_or(BookingError::NotFound(appointment_id))?;
            if current.version != expected {
                metrics::counter!(observability::VERSION_MISMATCHES_TOTAL).increment(1);
                debug!(
                    appointment = %appointment_id,
                    stale = expected,
                    stored = current.version,
                    "stale version on update, adopting the stored row"
                );
                adopted_newer = true;
                expected = current.version;
            }

            let updated = changes.apply_to(&current);
            let window = validate_appointment(&updated)?;

            if updated.status.is_occupying() {
                if let Openness::Closed(reason) = self
                    .resolver
                    .resolve(updated.barber_id, updated.date(), window)
                    .await
                {
                    return Err(if adopted_newer {
                        BookingError::ConcurrentModification {
                            appointment_id,
                            blocked_by: BlockedBy::Availability(reason),
                        }
                    } else {
                        BookingError::OutsideAvailability(reason)
                    });
                }
                let conflicts = self
                    .detector
                    .find_conflicts(updated.barber_id, updated.effective_slot(), Some(appointment_id))
                    .await;
                if !conflicts.is_empty() {
                    metrics::counter!(observability::CONFLICTS_DETECTED_TOTAL).increment(1);
                    return Err(if adopted_newer {
                        BookingError::ConcurrentModification {
                            appointment_id,
                            blocked_by: BlockedBy::Conflicts(conflicts),
                        }
                    } else {
                        BookingError::SchedulingConflict { conflicts }
                    });
                }
            }

            match self
                .appointments
                .commit_versioned(appointment_id, expected, updated)
                .await
            {
                Ok(committed) => {
                    debug!(appointment = %appointment_id, version = committed.version, "booking updated");
                    return Ok(committed);
                }
                Err(WriteRejection::VersionMismatch { actual, .. }) => {
                    metrics::counter!(observability::VERSION_MISMATCHES_TOTAL).increment(1);
                    adopted_newer = true;
                    expected = actual;
                }
                Err(WriteRejection::OverlapConstraint(conflicts)) => {
                    metrics::counter!(observability::CONSTRAINT_REJECTIONS_TOTAL).increment(1);
                    last_conflicts = conflicts;
                }
                Err(WriteRejection::NotFound(id)) => return Err(BookingError::NotFound(id)),
            }
        }

        warn!(appointment = %appointment_id, "update retry budget exhausted");
        metrics::counter!(observability::RETRIES_EXHAUSTED_TOTAL).increment(1);
        Err(BookingError::RetriesExhausted {
            attempts: self.policy.max_attempts(),
            last_conflicts,
        })
    }

    // ── Cancel ───────────────────────────────────────────────

    /// Cancelling frees the slot for subsequent conflict scans. Cancelling an
    /// already-cancelled appointment is a no-op success.
    pub async fn cancel_booking(
        &self,
        appointment_id: AppointmentId,
        expected_version: Version,
    ) -> Result<Appointment, BookingError> {
        let started = Instant::now();
        let result = self.cancel_inner(appointment_id, expected_version).await;
        record_outcome("cancel", started, &result);
        result
    }

    async fn cancel_inner(
        &self,
        appointment_id: AppointmentId,
        expected_version: Version,
    ) -> Result<Appointment, BookingError> {
        let mut expected = expected_version;

        for attempt in 0..self.policy.max_attempts() {
            if attempt > 0 {
                metrics::counter!(observability::BOOKING_RETRIES_TOTAL).increment(1);
                self.sleeper.sleep(self.policy.backoff(attempt - 1)).await;
            }

            let current = self
                .appointments
                .get(appointment_id)
                .await
                .ok_or(BookingError::NotFound(appointment_id))?;
            if current.status == AppointmentStatus::Cancelled {
                return Ok(current);
            }
            if current.version != expected {
                metrics::counter!(observability::VERSION_MISMATCHES_TOTAL).increment(1);
                expected = current.version;
            }

            let mut cancelled = current;
            cancelled.status = AppointmentStatus::Cancelled;
            match self
                .appointments
                .commit_versioned(appointment_id, expected, cancelled)
                .await
            {
                Ok(committed) => {
                    debug!(appointment = %appointment_id, "booking cancelled");
                    return Ok(committed);
                }
                Err(WriteRejection::VersionMismatch { actual, .. }) => {
                    metrics::counter!(observability::VERSION_MISMATCHES_TOTAL).increment(1);
                    expected = actual;
                }
                // Cancelled rows are non-occupying; the constraint never
                // applies to them.
                Err(WriteRejection::OverlapConstraint(_)) => {}
                Err(WriteRejection::NotFound(id)) => return Err(BookingError::NotFound(id)),
            }
        }

        warn!(appointment = %appointment_id, "cancel retry budget exhausted");
        metrics::counter!(observability::RETRIES_EXHAUSTED_TOTAL).increment(1);
        Err(BookingError::RetriesExhausted {
            attempts: self.policy.max_attempts(),
            last_conflicts: Vec::new(),
        })
    }
}

fn validate_request(request: &BookingRequest) -> Result<DayWindow, BookingError> {
    validate_shape(
        request.duration_minutes,
        request.buffer_before,
        request.buffer_after,
    )?;
    request
        .service_window()
        .ok_or(BookingError::InvalidRequest("service must end before midnight"))
}

fn validate_appointment(appt: &Appointment) -> Result<DayWindow, BookingError> {
    validate_shape(appt.duration_minutes, appt.buffer_before, appt.buffer_after)?;
    appt.service_window()
        .ok_or(BookingError::InvalidRequest("service must end before midnight"))
}

fn validate_shape(duration: u32, before: u32, after: u32) -> Result<(), BookingError> {
    if duration == 0 {
        return Err(BookingError::InvalidRequest("duration must be at least one minute"));
    }
    if duration > MAX_DURATION_MINUTES {
        return Err(BookingError::InvalidRequest("duration too long"));
    }
    if before > MAX_BUFFER_MINUTES || after > MAX_BUFFER_MINUTES {
        return Err(BookingError::InvalidRequest("buffer too long"));
    }
    Ok(())
}

fn record_outcome(op: &'static str, started: Instant, result: &Result<Appointment, BookingError>) {
    metrics::histogram!(observability::BOOKING_DURATION_SECONDS, "op" => op)
        .record(started.elapsed().as_secs_f64());
    let status = match result {
        Ok(_) => "ok",
        Err(BookingError::InvalidRequest(_)) => "invalid",
        Err(BookingError::NotFound(_)) => "not_found",
        Err(BookingError::OutsideAvailability(_)) => "outside_availability",
        Err(BookingError::SchedulingConflict { .. }) => "conflict",
        Err(BookingError::ConcurrentModification { .. }) => "concurrent_modification",
        Err(BookingError::RetriesExhausted { .. }) => "retries_exhausted",
    };
    metrics::counter!(observability::BOOKINGS_TOTAL, "op" => op, "status" => status)
        .increment(1);
}
