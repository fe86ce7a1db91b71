use std::sync::Arc;

use crate::model::*;
use crate::store::AppointmentStore;

/// Strict half-open overlap between an existing appointment's effective
/// interval and a buffer-expanded candidate slot. Back-to-back bookings whose
/// intervals exactly touch do not conflict.
pub fn conflicts_with(existing: &Appointment, candidate: &Slot) -> bool {
    existing.status.is_occupying() && existing.effective_slot().overlaps(candidate)
}

/// Scans a barber's active appointments for overlap against a candidate
/// interval. The candidate's buffers are the caller's job — the coordinator
/// passes in the already-expanded effective window.
pub struct ConflictDetector {
    store: Arc<AppointmentStore>,
}

impl ConflictDetector {
    pub fn new(store: Arc<AppointmentStore>) -> Self {
        Self { store }
    }

    /// All occupying appointments whose effective interval overlaps
    /// `candidate`. Non-empty means a hard conflict. `exclude` supports
    /// "move this appointment" checks.
    pub async fn find_conflicts(
        &self,
        barber_id: BarberId,
        candidate: Slot,
        exclude: Option<AppointmentId>,
    ) -> Vec<Appointment> {
        self.store
            .occupying_within(barber_id, candidate, exclude)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
    use ulid::Ulid;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 2)
            .unwrap()
            .and_time(NaiveTime::from_hms_opt(h, m, 0).unwrap())
    }

    fn appt(start: NaiveDateTime, duration: u32, before: u32, after: u32) -> Appointment {
        Appointment {
            id: Ulid::new(),
            barber_id: 1,
            client_id: 7,
            start_time: start,
            duration_minutes: duration,
            buffer_before: before,
            buffer_after: after,
            status: AppointmentStatus::Scheduled,
            version: 1,
            price: None,
        }
    }

    #[test]
    fn buffers_count_toward_conflicts() {
        // 10:00 + 30 min with 15/15 buffers occupies 09:45–10:45.
        let existing = appt(at(10, 0), 30, 15, 15);
        assert!(conflicts_with(&existing, &Slot::new(at(10, 30), at(11, 0))));
        assert!(conflicts_with(&existing, &Slot::new(at(9, 0), at(10, 0))));
        assert!(!conflicts_with(&existing, &Slot::new(at(10, 45), at(11, 15))));
    }

    #[test]
    fn touching_intervals_do_not_conflict() {
        let existing = appt(at(10, 0), 30, 0, 15); // ends 10:45 effective
        let candidate = Slot::new(at(10, 45), at(11, 30));
        assert!(!conflicts_with(&existing, &candidate));
    }

    #[test]
    fn non_occupying_statuses_never_conflict() {
        let mut existing = appt(at(10, 0), 30, 0, 0);
        let candidate = Slot::new(at(10, 0), at(10, 30));
        for status in [
            AppointmentStatus::Cancelled,
            AppointmentStatus::Completed,
            AppointmentStatus::NoShow,
        ] {
            existing.status = status;
            assert!(!conflicts_with(&existing, &candidate));
        }
    }

    #[tokio::test]
    async fn detector_scans_one_barber_only() {
        let store = Arc::new(AppointmentStore::new());
        let booked = store.insert(appt(at(10, 0), 30, 15, 15)).await.unwrap();
        let detector = ConflictDetector::new(store);

        let candidate = Slot::new(at(10, 15), at(10, 45));
        let hits = detector.find_conflicts(1, candidate, None).await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, booked.id);

        assert!(detector.find_conflicts(2, candidate, None).await.is_empty());
        assert!(
            detector
                .find_conflicts(1, candidate, Some(booked.id))
                .await
                .is_empty()
        );
    }
}
