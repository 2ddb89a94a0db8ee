use chrono::NaiveDate;
use tracing::{debug, info};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::notify::Notification;

use super::reconcile::{check_bookable, Unbookable};
use super::{Engine, EngineError};

fn reject(reason: Unbookable) -> EngineError {
    metrics::counter!(crate::observability::BOOKINGS_REJECTED_TOTAL, "reason" => reason.label())
        .increment(1);
    EngineError::BadRequest(reason.message().into())
}

impl Engine {
    /// Create a PENDING session for `student_email` with `tutor_id`.
    ///
    /// Availability is not consumed here; windows only change once the
    /// session is paid. Requests for one tutor run under the tutor lock, so
    /// the overlap check and the insert see the same set of live sessions.
    pub async fn request_session(
        &self,
        student_email: &str,
        tutor_id: Ulid,
        date: NaiveDate,
        slot: Slot,
    ) -> Result<Session, EngineError> {
        let student = self
            .store
            .student_by_email(student_email)
            .ok_or_else(|| EngineError::NotFound(format!("student not found: {student_email}")))?;
        let lock = self
            .store
            .tutor_lock(&tutor_id)
            .ok_or_else(|| EngineError::NotFound(format!("tutor not found: {tutor_id}")))?;
        if !slot.is_valid() {
            return Err(reject(Unbookable::InvalidRange));
        }

        let _guard = lock.lock().await;
        if self.store.session_count(tutor_id, date) >= MAX_SESSIONS_PER_TUTOR_DAY {
            return Err(EngineError::LimitExceeded("too many sessions on date"));
        }

        let availability = self.store.find_by_tutor_and_date(tutor_id, date);
        let tutor_busy: Vec<Slot> = self
            .store
            .find_overlapping_for_tutor(tutor_id, date, &slot)
            .iter()
            .map(|s| s.slot)
            .collect();
        let student_busy: Vec<Slot> = self
            .store
            .find_overlapping_for_student(student.id, date, &slot)
            .iter()
            .map(|s| s.slot)
            .collect();

        if let Err(reason) = check_bookable(date, &slot, &availability, &tutor_busy, &student_busy) {
            debug!(
                "session request by {} for tutor {tutor_id} on {date} [{}, {}) refused: {}",
                student.id,
                slot.start,
                slot.end,
                reason.label()
            );
            return Err(reject(reason));
        }

        let session = Session {
            id: Ulid::new(),
            tutor_id,
            student_id: student.id,
            date,
            slot,
            status: SessionStatus::Pending,
        };
        self.commit(vec![Event::SessionRequested {
            id: session.id,
            tutor_id,
            student_id: student.id,
            date,
            slot,
        }])
        .await?;

        metrics::counter!(crate::observability::SESSIONS_REQUESTED_TOTAL).increment(1);
        info!(
            "session {} requested: tutor {tutor_id}, student {}, {date} [{}, {})",
            session.id, student.id, slot.start, slot.end
        );
        let note = Notification::SessionRequested {
            session_id: session.id,
            date,
            slot,
        };
        self.notify.send(student.id, &note);
        self.notify.send(tutor_id, &note);
        Ok(session)
    }
}
