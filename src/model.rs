use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Half-open time-of-day range `[start, end)` on a single calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slot {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Slot {
    /// Builds a slot without checking `start < end`; callers validate with
    /// [`Slot::is_valid`] before the slot reaches the reconciler.
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn is_valid(&self) -> bool {
        self.start < self.end
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    pub fn overlaps(&self, other: &Slot) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Returns true if `self` fully contains `other`.
    pub fn envelops(&self, other: &Slot) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// A tutor-declared bookable range on one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub id: Ulid,
    pub tutor_id: Ulid,
    pub date: NaiveDate,
    pub slot: Slot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl SessionStatus {
    /// Pending and confirmed sessions occupy their slot; cancelled ones don't.
    pub fn occupies(&self) -> bool {
        matches!(self, SessionStatus::Pending | SessionStatus::Confirmed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: Ulid,
    pub tutor_id: Ulid,
    pub student_id: Ulid,
    pub date: NaiveDate,
    pub slot: Slot,
    pub status: SessionStatus,
}

impl Session {
    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.slot.start)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Card,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Ulid,
    pub session_id: Ulid,
    pub tutor_id: Ulid,
    pub student_id: Ulid,
    pub amount: Decimal,
    pub platform_fee: Decimal,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    /// Gateway charge reference; only set on completed payments.
    pub reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tutor {
    pub id: Ulid,
    pub name: String,
    pub email: String,
    pub hourly_rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: Ulid,
    pub name: String,
    pub email: String,
}

/// The event types: flat, no nesting. A transaction is a `Vec<Event>` and is
/// the unit of the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    TutorRegistered {
        id: Ulid,
        name: String,
        email: String,
        hourly_rate: Decimal,
    },
    StudentRegistered {
        id: Ulid,
        name: String,
        email: String,
    },
    WindowAdded {
        id: Ulid,
        tutor_id: Ulid,
        date: NaiveDate,
        slot: Slot,
    },
    WindowResized {
        id: Ulid,
        tutor_id: Ulid,
        slot: Slot,
    },
    WindowRemoved {
        id: Ulid,
        tutor_id: Ulid,
    },
    SessionRequested {
        id: Ulid,
        tutor_id: Ulid,
        student_id: Ulid,
        date: NaiveDate,
        slot: Slot,
    },
    SessionConfirmed {
        id: Ulid,
        tutor_id: Ulid,
    },
    PaymentRecorded {
        payment: Payment,
    },
}

#[cfg(test)]
pub(crate) fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

#[cfg(test)]
pub(crate) fn slot(sh: u32, sm: u32, eh: u32, em: u32) -> Slot {
    Slot::new(t(sh, sm), t(eh, em))
}
