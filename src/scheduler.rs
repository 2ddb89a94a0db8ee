use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use tracing::{debug, info};

use crate::engine::Engine;
use crate::notify::Notification;

/// Publish a reminder to both parties of every session due at `now`.
/// Returns how many sessions were reminded.
pub fn send_due_reminders(engine: &Engine, now: NaiveDateTime) -> usize {
    let due = engine.sessions_due_for_reminder(now);
    for session in &due {
        let note = Notification::Reminder {
            session_id: session.id,
            starts_at: session.starts_at(),
        };
        engine.notify.send(session.student_id, &note);
        engine.notify.send(session.tutor_id, &note);
    }
    if !due.is_empty() {
        metrics::counter!(crate::observability::REMINDERS_SENT_TOTAL).increment(due.len() as u64);
        info!("sent reminders for {} sessions", due.len());
    }
    due.len()
}

/// Background task that periodically reminds students and tutors of
/// sessions starting in about a day.
pub async fn run_reminders(engine: Arc<Engine>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        send_due_reminders(&engine, chrono::Local::now().naive_local());
    }
}

/// Background task that compacts the WAL when enough appends accumulate.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(30));
    loop {
        interval.tick().await;
        let appends = engine.wal_appends_since_compact().await;
        if appends < threshold {
            debug!("compactor skip: {appends} appends since last compaction");
            continue;
        }
        match engine.compact_wal().await {
            Ok(()) => info!("compacted WAL after {appends} appends"),
            Err(e) => tracing::error!("WAL compaction failed: {e}"),
        }
    }
}
