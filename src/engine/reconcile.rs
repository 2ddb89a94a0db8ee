//! Slot bookability and availability-window editing.
//!
//! Everything here is pure: inputs are snapshots taken under the tutor's
//! schedule lock, outputs are verdicts and edit instructions the caller turns
//! into events.

use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::*;

/// Why a candidate slot cannot be booked. Variants are listed in the order
/// the checks run; the first failing check wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unbookable {
    InvalidRange,
    NotAvailable,
    TutorOccupied,
    StudentOccupied,
}

impl Unbookable {
    pub fn message(&self) -> &'static str {
        match self {
            Unbookable::InvalidRange => "end time must be after start time",
            Unbookable::NotAvailable => "tutor is not available at the selected date and time",
            Unbookable::TutorOccupied => {
                "the selected time slot is no longer available or is already taken"
            }
            Unbookable::StudentOccupied => {
                "you already have a session booked that overlaps this time slot"
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Unbookable::InvalidRange => "invalid_range",
            Unbookable::NotAvailable => "not_available",
            Unbookable::TutorOccupied => "tutor_occupied",
            Unbookable::StudentOccupied => "student_occupied",
        }
    }
}

/// Check `candidate` on `date` against the tutor's windows and the live
/// sessions of both parties.
pub fn check_bookable(
    date: NaiveDate,
    candidate: &Slot,
    availability: &[AvailabilityWindow],
    tutor_sessions: &[Slot],
    student_sessions: &[Slot],
) -> Result<(), Unbookable> {
    if !candidate.is_valid() {
        return Err(Unbookable::InvalidRange);
    }
    let enveloped = availability
        .iter()
        .any(|w| w.date == date && w.slot.envelops(candidate));
    if !enveloped {
        return Err(Unbookable::NotAvailable);
    }
    if tutor_sessions.iter().any(|s| s.overlaps(candidate)) {
        return Err(Unbookable::TutorOccupied);
    }
    if student_sessions.iter().any(|s| s.overlaps(candidate)) {
        return Err(Unbookable::StudentOccupied);
    }
    Ok(())
}

pub fn is_bookable(
    date: NaiveDate,
    candidate: &Slot,
    availability: &[AvailabilityWindow],
    tutor_sessions: &[Slot],
    student_sessions: &[Slot],
) -> bool {
    check_bookable(date, candidate, availability, tutor_sessions, student_sessions).is_ok()
}

/// One mutation of a tutor's availability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowEdit {
    Delete { id: Ulid },
    Resize { id: Ulid, slot: Slot },
    Create { date: NaiveDate, slot: Slot },
}

/// Conditions that should never occur if windows and sessions are consistent.
/// They are logged and counted; the confirmation that hit them still commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anomaly {
    NoEnvelopingWindow {
        tutor_id: Ulid,
        date: NaiveDate,
        consumed: Slot,
    },
    RaggedOverlap {
        window_id: Ulid,
        window: Slot,
        consumed: Slot,
    },
}

impl Anomaly {
    pub fn label(&self) -> &'static str {
        match self {
            Anomaly::NoEnvelopingWindow { .. } => "no_enveloping_window",
            Anomaly::RaggedOverlap { .. } => "ragged_overlap",
        }
    }
}

impl std::fmt::Display for Anomaly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Anomaly::NoEnvelopingWindow { tutor_id, date, consumed } => write!(
                f,
                "no availability window of tutor {tutor_id} on {date} envelops [{}, {})",
                consumed.start, consumed.end
            ),
            Anomaly::RaggedOverlap { window_id, window, consumed } => write!(
                f,
                "window {window_id} [{}, {}) only partially covers [{}, {})",
                window.start, window.end, consumed.start, consumed.end
            ),
        }
    }
}

/// Compute the edits that remove `consumed` from `window`.
///
/// First matching case wins:
/// 1. exact match: delete the window
/// 2. shared start: move the window start to `consumed.end`
/// 3. shared end: move the window end to `consumed.start`
/// 4. strictly inside: cut the window at `consumed.start` and create
///    `[consumed.end, window.end)`
///
/// Any other placement leaves the window untouched and reports an anomaly.
pub fn reconcile_after_booking(
    consumed: &Slot,
    window: &AvailabilityWindow,
) -> Result<Vec<WindowEdit>, Anomaly> {
    let w = window.slot;
    if w == *consumed {
        return Ok(vec![WindowEdit::Delete { id: window.id }]);
    }
    if consumed.start == w.start && consumed.end < w.end {
        return Ok(vec![WindowEdit::Resize {
            id: window.id,
            slot: Slot::new(consumed.end, w.end),
        }]);
    }
    if consumed.start > w.start && consumed.end == w.end {
        return Ok(vec![WindowEdit::Resize {
            id: window.id,
            slot: Slot::new(w.start, consumed.start),
        }]);
    }
    if consumed.start > w.start && consumed.end < w.end {
        return Ok(vec![
            WindowEdit::Resize {
                id: window.id,
                slot: Slot::new(w.start, consumed.start),
            },
            WindowEdit::Create {
                date: window.date,
                slot: Slot::new(consumed.end, w.end),
            },
        ]);
    }
    Err(Anomaly::RaggedOverlap {
        window_id: window.id,
        window: w,
        consumed: *consumed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
    }

    fn window(s: Slot) -> AvailabilityWindow {
        AvailabilityWindow {
            id: Ulid::new(),
            tutor_id: Ulid::new(),
            date: date(),
            slot: s,
        }
    }

    /// Apply edits to a single window and return the surviving slots, sorted.
    fn remaining(w: &AvailabilityWindow, edits: &[WindowEdit]) -> Vec<Slot> {
        let mut out = vec![w.slot];
        for edit in edits {
            match edit {
                WindowEdit::Delete { id } => {
                    assert_eq!(*id, w.id);
                    out.remove(0);
                }
                WindowEdit::Resize { id, slot } => {
                    assert_eq!(*id, w.id);
                    out[0] = *slot;
                }
                WindowEdit::Create { date: d, slot } => {
                    assert_eq!(*d, w.date);
                    out.push(*slot);
                }
            }
        }
        out.sort_by_key(|s| s.start);
        out
    }

    // ── bookability ──────────────────────────────────────

    #[test]
    fn bookable_inside_window() {
        let avail = [window(slot(9, 0, 12, 0))];
        assert!(is_bookable(date(), &slot(10, 0, 11, 0), &avail, &[], &[]));
        assert!(is_bookable(date(), &slot(9, 0, 12, 0), &avail, &[], &[]));
    }

    #[test]
    fn invalid_range_checked_first() {
        // No availability at all, but the range error wins.
        assert_eq!(
            check_bookable(date(), &slot(11, 0, 10, 0), &[], &[], &[]),
            Err(Unbookable::InvalidRange)
        );
        assert_eq!(
            check_bookable(date(), &slot(10, 0, 10, 0), &[], &[], &[]),
            Err(Unbookable::InvalidRange)
        );
    }

    #[test]
    fn must_be_enveloped_by_one_window() {
        // Two adjacent windows together cover the slot, but neither alone does.
        let avail = [window(slot(9, 0, 10, 0)), window(slot(10, 0, 11, 0))];
        assert_eq!(
            check_bookable(date(), &slot(9, 30, 10, 30), &avail, &[], &[]),
            Err(Unbookable::NotAvailable)
        );
    }

    #[test]
    fn window_on_other_date_does_not_count() {
        let mut w = window(slot(9, 0, 12, 0));
        w.date = date().succ_opt().unwrap();
        assert_eq!(
            check_bookable(date(), &slot(10, 0, 11, 0), &[w], &[], &[]),
            Err(Unbookable::NotAvailable)
        );
    }

    #[test]
    fn tutor_overlap_before_student_overlap() {
        let avail = [window(slot(9, 0, 12, 0))];
        let busy = [slot(10, 30, 11, 30)];
        assert_eq!(
            check_bookable(date(), &slot(10, 0, 11, 0), &avail, &busy, &busy),
            Err(Unbookable::TutorOccupied)
        );
        assert_eq!(
            check_bookable(date(), &slot(10, 0, 11, 0), &avail, &[], &busy),
            Err(Unbookable::StudentOccupied)
        );
    }

    #[test]
    fn adjacent_sessions_do_not_block() {
        let avail = [window(slot(9, 0, 12, 0))];
        let tutor = [slot(9, 0, 10, 0)];
        let student = [slot(11, 0, 12, 0)];
        assert!(is_bookable(date(), &slot(10, 0, 11, 0), &avail, &tutor, &student));
    }

    // ── reconciliation ───────────────────────────────────

    #[test]
    fn exact_match_deletes() {
        let w = window(slot(10, 0, 11, 0));
        let edits = reconcile_after_booking(&slot(10, 0, 11, 0), &w).unwrap();
        assert_eq!(edits, vec![WindowEdit::Delete { id: w.id }]);
        assert!(remaining(&w, &edits).is_empty());
    }

    #[test]
    fn head_consumed_shrinks_start() {
        let w = window(slot(9, 0, 12, 0));
        let edits = reconcile_after_booking(&slot(9, 0, 10, 0), &w).unwrap();
        assert_eq!(remaining(&w, &edits), vec![slot(10, 0, 12, 0)]);
    }

    #[test]
    fn tail_consumed_shrinks_end() {
        let w = window(slot(9, 0, 12, 0));
        let edits = reconcile_after_booking(&slot(11, 0, 12, 0), &w).unwrap();
        assert_eq!(remaining(&w, &edits), vec![slot(9, 0, 11, 0)]);
    }

    #[test]
    fn interior_consumed_splits() {
        let w = window(slot(9, 0, 12, 0));
        let edits = reconcile_after_booking(&slot(10, 0, 11, 0), &w).unwrap();
        assert_eq!(edits.len(), 2);
        assert_eq!(
            remaining(&w, &edits),
            vec![slot(9, 0, 10, 0), slot(11, 0, 12, 0)]
        );
    }

    #[test]
    fn ragged_overlap_is_an_anomaly() {
        let w = window(slot(9, 0, 12, 0));
        let err = reconcile_after_booking(&slot(11, 0, 13, 0), &w).unwrap_err();
        assert_eq!(err.label(), "ragged_overlap");
        let err = reconcile_after_booking(&slot(8, 0, 10, 0), &w).unwrap_err();
        assert!(matches!(err, Anomaly::RaggedOverlap { window_id, .. } if window_id == w.id));
    }

    #[test]
    fn free_time_is_conserved() {
        // For every enveloped slot on a 15-minute grid, remaining + consumed
        // minutes equal the original window.
        let w = window(slot(9, 0, 12, 0));
        let total = w.slot.duration_minutes();
        let grid: Vec<_> = (0..=12).map(|q| t(9 + q / 4, (q % 4) * 15)).collect();
        for (i, &start) in grid.iter().enumerate() {
            for &end in &grid[i + 1..] {
                let consumed = Slot::new(start, end);
                let edits = reconcile_after_booking(&consumed, &w).unwrap();
                let left: i64 = remaining(&w, &edits).iter().map(|s| s.duration_minutes()).sum();
                assert_eq!(left + consumed.duration_minutes(), total);
                assert!(remaining(&w, &edits).iter().all(|s| !s.overlaps(&consumed)));
            }
        }
    }
}
