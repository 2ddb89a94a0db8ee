use chrono::{Duration, NaiveDate, NaiveDateTime};
use ulid::Ulid;

use crate::model::*;

use super::store::Account;
use super::{Engine, EngineError};

/// How far ahead reminders look, in hours.
pub const REMINDER_LEAD_HOURS: i64 = 24;
/// Half-width of the reminder window, in minutes.
pub const REMINDER_SLACK_MINUTES: i64 = 30;

impl Engine {
    pub fn availability_for(&self, tutor_id: Ulid, date: NaiveDate) -> Result<Vec<AvailabilityWindow>, EngineError> {
        if self.store.tutor(&tutor_id).is_none() {
            return Err(EngineError::NotFound(format!("tutor not found: {tutor_id}")));
        }
        Ok(self.store.find_by_tutor_and_date(tutor_id, date))
    }

    pub fn session(&self, id: Ulid) -> Result<Session, EngineError> {
        self.store
            .find_session(&id)
            .ok_or_else(|| EngineError::NotFound(format!("session not found: {id}")))
    }

    /// One session, visible only to its student and its tutor.
    pub fn session_for(&self, email: &str, id: Ulid) -> Result<Session, EngineError> {
        let account = self
            .store
            .account(email)
            .ok_or_else(|| EngineError::NotFound(format!("user not found: {email}")))?;
        let session = self.session(id)?;
        let participant = match account {
            Account::Student(sid) => session.student_id == sid,
            Account::Tutor(tid) => session.tutor_id == tid,
        };
        if !participant {
            return Err(EngineError::Forbidden("you are not part of this session".into()));
        }
        Ok(session)
    }

    /// Sessions of the account behind `email`: a student's bookings or a
    /// tutor's schedule.
    pub fn sessions_for(&self, email: &str) -> Result<Vec<Session>, EngineError> {
        match self.store.account(email) {
            Some(Account::Student(id)) => Ok(self.store.sessions_for_student(id)),
            Some(Account::Tutor(id)) => Ok(self.store.sessions_for_tutor(id)),
            None => Err(EngineError::NotFound(format!("user not found: {email}"))),
        }
    }

    /// Payments made by a student, or received by a tutor. Unknown emails
    /// have no history.
    pub fn payment_history(&self, email: &str) -> Vec<Payment> {
        match self.store.account(email) {
            Some(Account::Student(id)) => self.store.payments_for_student(&id),
            Some(Account::Tutor(id)) => self.store.payments_for_tutor(&id),
            None => Vec::new(),
        }
    }

    /// Confirmed sessions starting roughly a day after `now`.
    pub fn sessions_due_for_reminder(&self, now: NaiveDateTime) -> Vec<Session> {
        let target = now + Duration::hours(REMINDER_LEAD_HOURS);
        let slack = Duration::minutes(REMINDER_SLACK_MINUTES);
        self.store
            .confirmed_sessions_starting_between(target - slack, target + slack)
    }
}
