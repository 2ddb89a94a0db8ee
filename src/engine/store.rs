use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use dashmap::DashMap;
use tokio::sync::Mutex;
use ulid::Ulid;

use crate::model::*;

/// Serializes every transaction that touches one tutor's schedule.
pub type TutorLock = Arc<Mutex<()>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Account {
    Student(Ulid),
    Tutor(Ulid),
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

pub struct InMemoryStore {
    tutors: DashMap<Ulid, Tutor>,
    students: DashMap<Ulid, Student>,
    accounts: DashMap<String, Account>,
    tutor_locks: DashMap<Ulid, TutorLock>,
    /// Windows per tutor-day, sorted by `slot.start`.
    day_windows: DashMap<(Ulid, NaiveDate), Vec<AvailabilityWindow>>,
    /// Reverse lookup: window id → (tutor, date)
    window_index: DashMap<Ulid, (Ulid, NaiveDate)>,
    sessions: DashMap<Ulid, Session>,
    tutor_day_sessions: DashMap<(Ulid, NaiveDate), Vec<Ulid>>,
    student_day_sessions: DashMap<(Ulid, NaiveDate), Vec<Ulid>>,
    payments: DashMap<Ulid, Payment>,
    student_payments: DashMap<Ulid, Vec<Ulid>>,
    tutor_payments: DashMap<Ulid, Vec<Ulid>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tutors: DashMap::new(),
            students: DashMap::new(),
            accounts: DashMap::new(),
            tutor_locks: DashMap::new(),
            day_windows: DashMap::new(),
            window_index: DashMap::new(),
            sessions: DashMap::new(),
            tutor_day_sessions: DashMap::new(),
            student_day_sessions: DashMap::new(),
            payments: DashMap::new(),
            student_payments: DashMap::new(),
            tutor_payments: DashMap::new(),
        }
    }

    // ── Directory ────────────────────────────────────────────

    pub fn account(&self, email: &str) -> Option<Account> {
        self.accounts.get(&normalize_email(email)).map(|e| *e.value())
    }

    pub fn student_by_email(&self, email: &str) -> Option<Student> {
        match self.account(email)? {
            Account::Student(id) => self.student(&id),
            Account::Tutor(_) => None,
        }
    }

    pub fn student(&self, id: &Ulid) -> Option<Student> {
        self.students.get(id).map(|e| e.value().clone())
    }

    pub fn tutor(&self, id: &Ulid) -> Option<Tutor> {
        self.tutors.get(id).map(|e| e.value().clone())
    }

    pub fn tutor_lock(&self, tutor_id: &Ulid) -> Option<TutorLock> {
        self.tutor_locks.get(tutor_id).map(|e| e.value().clone())
    }

    // ── Availability ─────────────────────────────────────────

    pub fn find_by_tutor_and_date(&self, tutor_id: Ulid, date: NaiveDate) -> Vec<AvailabilityWindow> {
        self.day_windows
            .get(&(tutor_id, date))
            .map(|e| e.value().clone())
            .unwrap_or_default()
    }

    /// Windows that fully contain `slot`, in start order.
    pub fn find_windows_enveloping_slot(
        &self,
        tutor_id: Ulid,
        date: NaiveDate,
        slot: &Slot,
    ) -> Vec<AvailabilityWindow> {
        self.day_windows
            .get(&(tutor_id, date))
            .map(|e| {
                e.value()
                    .iter()
                    .filter(|w| w.slot.envelops(slot))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn window_count(&self, tutor_id: Ulid, date: NaiveDate) -> usize {
        self.day_windows
            .get(&(tutor_id, date))
            .map_or(0, |e| e.value().len())
    }

    // ── Sessions ─────────────────────────────────────────────

    pub fn find_session(&self, id: &Ulid) -> Option<Session> {
        self.sessions.get(id).map(|e| e.value().clone())
    }

    fn live_overlapping(&self, ids: Option<Vec<Ulid>>, slot: &Slot) -> Vec<Session> {
        ids.unwrap_or_default()
            .iter()
            .filter_map(|id| self.find_session(id))
            .filter(|s| s.status.occupies() && s.slot.overlaps(slot))
            .collect()
    }

    /// Pending or confirmed sessions of the tutor on `date` that overlap `slot`.
    pub fn find_overlapping_for_tutor(&self, tutor_id: Ulid, date: NaiveDate, slot: &Slot) -> Vec<Session> {
        let ids = self
            .tutor_day_sessions
            .get(&(tutor_id, date))
            .map(|e| e.value().clone());
        self.live_overlapping(ids, slot)
    }

    /// Pending or confirmed sessions of the student on `date` that overlap `slot`.
    pub fn find_overlapping_for_student(
        &self,
        student_id: Ulid,
        date: NaiveDate,
        slot: &Slot,
    ) -> Vec<Session> {
        let ids = self
            .student_day_sessions
            .get(&(student_id, date))
            .map(|e| e.value().clone());
        self.live_overlapping(ids, slot)
    }

    pub fn session_count(&self, tutor_id: Ulid, date: NaiveDate) -> usize {
        self.tutor_day_sessions
            .get(&(tutor_id, date))
            .map_or(0, |e| e.value().len())
    }

    fn sorted_sessions(&self, pred: impl Fn(&Session) -> bool) -> Vec<Session> {
        let mut out: Vec<Session> = self
            .sessions
            .iter()
            .filter(|e| pred(e.value()))
            .map(|e| e.value().clone())
            .collect();
        out.sort_by_key(|s| (s.starts_at(), s.id));
        out
    }

    pub fn sessions_for_student(&self, student_id: Ulid) -> Vec<Session> {
        self.sorted_sessions(|s| s.student_id == student_id)
    }

    pub fn sessions_for_tutor(&self, tutor_id: Ulid) -> Vec<Session> {
        self.sorted_sessions(|s| s.tutor_id == tutor_id)
    }

    /// Confirmed sessions whose start lies in `[from, to)`.
    pub fn confirmed_sessions_starting_between(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Vec<Session> {
        self.sorted_sessions(|s| {
            s.status == SessionStatus::Confirmed && from <= s.starts_at() && s.starts_at() < to
        })
    }

    // ── Payments ─────────────────────────────────────────────

    pub fn payment(&self, id: &Ulid) -> Option<Payment> {
        self.payments.get(id).map(|e| e.value().clone())
    }

    fn payments_in(&self, index: &DashMap<Ulid, Vec<Ulid>>, owner: &Ulid) -> Vec<Payment> {
        let ids = index.get(owner).map(|e| e.value().clone()).unwrap_or_default();
        ids.iter().filter_map(|id| self.payment(id)).collect()
    }

    pub fn payments_for_student(&self, student_id: &Ulid) -> Vec<Payment> {
        self.payments_in(&self.student_payments, student_id)
    }

    pub fn payments_for_tutor(&self, tutor_id: &Ulid) -> Vec<Payment> {
        self.payments_in(&self.tutor_payments, tutor_id)
    }

    #[cfg(test)]
    pub(crate) fn completed_payment_for_session(&self, session_id: &Ulid) -> Option<Payment> {
        let session = self.find_session(session_id)?;
        self.payments_for_student(&session.student_id)
            .into_iter()
            .find(|p| p.session_id == *session_id && p.status == PaymentStatus::Completed)
    }

    // ── Event application ────────────────────────────────────

    /// Apply one committed event. The caller holds the tutor lock for any
    /// event that touches a tutor's schedule.
    pub fn apply_event(&self, event: &Event) {
        match event {
            Event::TutorRegistered {
                id,
                name,
                email,
                hourly_rate,
            } => {
                self.tutors.insert(
                    *id,
                    Tutor {
                        id: *id,
                        name: name.clone(),
                        email: email.clone(),
                        hourly_rate: *hourly_rate,
                    },
                );
                self.accounts.insert(normalize_email(email), Account::Tutor(*id));
                self.tutor_locks.entry(*id).or_default();
            }
            Event::StudentRegistered { id, name, email } => {
                self.students.insert(
                    *id,
                    Student {
                        id: *id,
                        name: name.clone(),
                        email: email.clone(),
                    },
                );
                self.accounts.insert(normalize_email(email), Account::Student(*id));
            }
            Event::WindowAdded {
                id,
                tutor_id,
                date,
                slot,
            } => {
                let window = AvailabilityWindow {
                    id: *id,
                    tutor_id: *tutor_id,
                    date: *date,
                    slot: *slot,
                };
                self.insert_window(window);
            }
            Event::WindowResized { id, slot, .. } => {
                if let Some(mut window) = self.remove_window(id) {
                    window.slot = *slot;
                    self.insert_window(window);
                }
            }
            Event::WindowRemoved { id, .. } => {
                self.remove_window(id);
            }
            Event::SessionRequested {
                id,
                tutor_id,
                student_id,
                date,
                slot,
            } => {
                self.sessions.insert(
                    *id,
                    Session {
                        id: *id,
                        tutor_id: *tutor_id,
                        student_id: *student_id,
                        date: *date,
                        slot: *slot,
                        status: SessionStatus::Pending,
                    },
                );
                self.tutor_day_sessions
                    .entry((*tutor_id, *date))
                    .or_default()
                    .push(*id);
                self.student_day_sessions
                    .entry((*student_id, *date))
                    .or_default()
                    .push(*id);
            }
            Event::SessionConfirmed { id, .. } => {
                if let Some(mut session) = self.sessions.get_mut(id) {
                    session.status = SessionStatus::Confirmed;
                }
            }
            Event::PaymentRecorded { payment } => {
                let fresh = self.payments.insert(payment.id, payment.clone()).is_none();
                if fresh {
                    self.student_payments
                        .entry(payment.student_id)
                        .or_default()
                        .push(payment.id);
                    self.tutor_payments
                        .entry(payment.tutor_id)
                        .or_default()
                        .push(payment.id);
                }
            }
        }
    }

    /// Insert a window maintaining start order within its day.
    fn insert_window(&self, window: AvailabilityWindow) {
        let key = (window.tutor_id, window.date);
        self.window_index.insert(window.id, key);
        let mut day = self.day_windows.entry(key).or_default();
        let pos = day
            .binary_search_by_key(&window.slot.start, |w| w.slot.start)
            .unwrap_or_else(|e| e);
        day.insert(pos, window);
    }

    fn remove_window(&self, id: &Ulid) -> Option<AvailabilityWindow> {
        let (_, key) = self.window_index.remove(id)?;
        let mut day = self.day_windows.get_mut(&key)?;
        let pos = day.iter().position(|w| w.id == *id)?;
        let window = day.remove(pos);
        let now_empty = day.is_empty();
        drop(day);
        if now_empty {
            self.day_windows.remove_if(&key, |_, v| v.is_empty());
        }
        Some(window)
    }

    /// Minimal event list that recreates the current state, as one transaction.
    pub fn snapshot_events(&self) -> Vec<Event> {
        let mut events = Vec::new();

        let mut tutors: Vec<Tutor> = self.tutors.iter().map(|e| e.value().clone()).collect();
        tutors.sort_by_key(|t| t.id);
        for t in tutors {
            events.push(Event::TutorRegistered {
                id: t.id,
                name: t.name,
                email: t.email,
                hourly_rate: t.hourly_rate,
            });
        }

        let mut students: Vec<Student> = self.students.iter().map(|e| e.value().clone()).collect();
        students.sort_by_key(|s| s.id);
        for s in students {
            events.push(Event::StudentRegistered {
                id: s.id,
                name: s.name,
                email: s.email,
            });
        }

        let mut days: Vec<Vec<AvailabilityWindow>> =
            self.day_windows.iter().map(|e| e.value().clone()).collect();
        days.sort_by_key(|d| d.first().map(|w| (w.tutor_id, w.date)));
        for w in days.into_iter().flatten() {
            events.push(Event::WindowAdded {
                id: w.id,
                tutor_id: w.tutor_id,
                date: w.date,
                slot: w.slot,
            });
        }

        let mut sessions: Vec<Session> = self.sessions.iter().map(|e| e.value().clone()).collect();
        sessions.sort_by_key(|s| s.id);
        for s in sessions {
            events.push(Event::SessionRequested {
                id: s.id,
                tutor_id: s.tutor_id,
                student_id: s.student_id,
                date: s.date,
                slot: s.slot,
            });
            if s.status == SessionStatus::Confirmed {
                events.push(Event::SessionConfirmed {
                    id: s.id,
                    tutor_id: s.tutor_id,
                });
            }
        }

        let mut payments: Vec<Payment> = self.payments.iter().map(|e| e.value().clone()).collect();
        payments.sort_by_key(|p| p.id);
        for payment in payments {
            events.push(Event::PaymentRecorded { payment });
        }

        events
    }
}
