use std::time::Instant;

use rust_decimal::Decimal;
use tokio::sync::MutexGuard;
use tracing::{error, info, warn};
use ulid::Ulid;

use crate::gateway::{ChargeReceipt, ChargeRequest};
use crate::limits::*;
use crate::model::*;
use crate::notify::Notification;
use crate::pricing::{self, Quote};

use super::reconcile::{reconcile_after_booking, Anomaly, WindowEdit};
use super::store::TutorLock;
use super::{Engine, EngineError};

const CURRENCY: &str = "usd";

const DECLINED: &str = "the payment was declined by the gateway";

/// Everything a payment needs, checked under the tutor lock.
struct Payable {
    student: Student,
    session: Session,
    tutor: Tutor,
    quote: Quote,
}

/// Turn reconciler edits into window events.
fn edit_events(tutor_id: Ulid, edits: Vec<WindowEdit>) -> impl Iterator<Item = Event> {
    edits.into_iter().map(move |edit| match edit {
        WindowEdit::Delete { id } => Event::WindowRemoved { id, tutor_id },
        WindowEdit::Resize { id, slot } => Event::WindowResized { id, tutor_id, slot },
        WindowEdit::Create { date, slot } => Event::WindowAdded {
            id: Ulid::new(),
            tutor_id,
            date,
            slot,
        },
    })
}

fn record_anomaly(session_id: Ulid, anomaly: &Anomaly) {
    warn!("availability not adjusted for session {session_id}: {anomaly}");
    metrics::counter!(crate::observability::RECONCILIATIONS_TOTAL, "outcome" => anomaly.label())
        .increment(1);
}

impl Engine {
    /// The lock of the tutor the session belongs to, if both exist.
    /// Validation re-reads the session after the lock is held.
    fn session_tutor_lock(&self, session_id: &Ulid) -> Option<TutorLock> {
        let session = self.store.find_session(session_id)?;
        self.store.tutor_lock(&session.tutor_id)
    }

    /// Checks shared by pending and confirmed payments, in order: student,
    /// session, ownership, PENDING status, tutor, positive duration.
    fn payable(&self, student_email: &str, session_id: Ulid) -> Result<Payable, EngineError> {
        let student = self
            .store
            .student_by_email(student_email)
            .ok_or_else(|| EngineError::NotFound(format!("student not found: {student_email}")))?;
        let session = self
            .store
            .find_session(&session_id)
            .ok_or_else(|| EngineError::NotFound(format!("session not found: {session_id}")))?;
        if session.student_id != student.id {
            return Err(EngineError::Forbidden(
                "you are not allowed to pay for this session".into(),
            ));
        }
        if session.status != SessionStatus::Pending {
            return Err(EngineError::BadRequest(
                "this session is not pending payment or has already been processed".into(),
            ));
        }
        let tutor = self.store.tutor(&session.tutor_id).ok_or_else(|| {
            EngineError::BadRequest(format!("session {session_id} has no assigned tutor"))
        })?;
        let minutes = session.slot.duration_minutes();
        if minutes <= 0 {
            return Err(EngineError::BadRequest("the session duration is invalid".into()));
        }
        let quote = pricing::quote(tutor.hourly_rate, minutes)
            .ok_or_else(|| EngineError::BadRequest("amount out of range".into()))?;
        Ok(Payable {
            student,
            session,
            tutor,
            quote,
        })
    }

    /// Submit the charge. Gateway errors, timeouts, and any status other
    /// than `succeeded` all come back as `PaymentRejected`.
    async fn charge(&self, token: &str, amount: Decimal, session_id: Ulid) -> Result<ChargeReceipt, EngineError> {
        let amount_minor = pricing::to_minor_units(amount)
            .ok_or_else(|| EngineError::BadRequest(format!("amount out of range: {amount}")))?;
        let request = ChargeRequest {
            token: token.to_string(),
            amount_minor,
            currency: CURRENCY,
            description: format!("tutoring session {session_id}"),
        };

        let started = Instant::now();
        let outcome = tokio::time::timeout(self.gateway_timeout, self.gateway.charge(&request)).await;
        metrics::histogram!(crate::observability::GATEWAY_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());

        let rejection = match outcome {
            Ok(Ok(receipt)) if receipt.succeeded() => return Ok(receipt),
            Ok(Ok(receipt)) => {
                warn!(
                    "charge {} for session {session_id} returned status {:?}",
                    receipt.reference, receipt.status
                );
                DECLINED.to_string()
            }
            Ok(Err(e)) => {
                warn!("charge for session {session_id} failed: {e}");
                DECLINED.to_string()
            }
            Err(_) => {
                warn!(
                    "charge for session {session_id} timed out after {:?}",
                    self.gateway_timeout
                );
                "the payment gateway did not respond in time".to_string()
            }
        };
        metrics::counter!(crate::observability::PAYMENTS_TOTAL, "outcome" => "rejected").increment(1);
        Err(EngineError::PaymentRejected(rejection))
    }

    /// Events that remove the session's slot from the tutor's availability.
    fn availability_events(&self, session: &Session) -> Vec<Event> {
        let enveloping =
            self.store
                .find_windows_enveloping_slot(session.tutor_id, session.date, &session.slot);
        let Some(window) = enveloping.first() else {
            record_anomaly(
                session.id,
                &Anomaly::NoEnvelopingWindow {
                    tutor_id: session.tutor_id,
                    date: session.date,
                    consumed: session.slot,
                },
            );
            return Vec::new();
        };
        match reconcile_after_booking(&session.slot, window) {
            Ok(edits) => {
                metrics::counter!(crate::observability::RECONCILIATIONS_TOTAL, "outcome" => "applied")
                    .increment(1);
                edit_events(session.tutor_id, edits).collect()
            }
            Err(anomaly) => {
                record_anomaly(session.id, &anomaly);
                Vec::new()
            }
        }
    }

    /// Charge the student, record a COMPLETED payment, confirm the session,
    /// and carve the session out of the tutor's availability, all in one
    /// transaction.
    pub async fn confirm_payment(
        &self,
        student_email: &str,
        session_id: Ulid,
        method: PaymentMethod,
        token: Option<&str>,
    ) -> Result<Payment, EngineError> {
        let lock = self.session_tutor_lock(&session_id);
        let _guard: Option<MutexGuard<'_, ()>> = match &lock {
            Some(l) => Some(l.lock().await),
            None => None,
        };

        let Payable {
            student,
            session,
            tutor,
            quote,
        } = self.payable(student_email, session_id)?;

        let token = token.map(str::trim).unwrap_or_default();
        if token.is_empty() {
            return Err(EngineError::BadRequest("payment token not provided".into()));
        }
        if token.len() > MAX_TOKEN_LEN {
            return Err(EngineError::LimitExceeded("payment token too long"));
        }

        let receipt = self.charge(token, quote.amount, session.id).await?;

        let payment = Payment {
            id: Ulid::new(),
            session_id: session.id,
            tutor_id: tutor.id,
            student_id: student.id,
            amount: quote.amount,
            platform_fee: quote.platform_fee,
            method,
            status: PaymentStatus::Completed,
            reference: Some(receipt.reference.clone()),
        };
        let mut txn = vec![
            Event::PaymentRecorded {
                payment: payment.clone(),
            },
            Event::SessionConfirmed {
                id: session.id,
                tutor_id: tutor.id,
            },
        ];
        txn.extend(self.availability_events(&session));

        if let Err(e) = self.commit(txn).await {
            // The card was charged but nothing was recorded.
            error!(
                "charge {} for session {} succeeded but commit failed: {e}",
                receipt.reference, session.id
            );
            return Err(e);
        }

        metrics::counter!(crate::observability::PAYMENTS_TOTAL, "outcome" => "completed").increment(1);
        info!(
            "session {} confirmed: payment {} amount {} fee {} ({})",
            session.id, payment.id, payment.amount, payment.platform_fee, receipt.reference
        );

        let confirmed = Notification::SessionConfirmed {
            session_id: session.id,
            date: session.date,
            slot: session.slot,
        };
        let paid = Notification::PaymentCompleted {
            payment_id: payment.id,
            session_id: session.id,
            amount: payment.amount,
        };
        for user in [student.id, tutor.id] {
            self.notify.send(user, &confirmed);
            self.notify.send(user, &paid);
        }
        Ok(payment)
    }

    /// Record an unconfirmed payment intent. No charge is made and neither
    /// the session nor the tutor's availability changes.
    pub async fn create_pending_payment(
        &self,
        student_email: &str,
        session_id: Ulid,
    ) -> Result<Payment, EngineError> {
        let lock = self.session_tutor_lock(&session_id);
        let _guard: Option<MutexGuard<'_, ()>> = match &lock {
            Some(l) => Some(l.lock().await),
            None => None,
        };

        let Payable {
            student,
            session,
            tutor,
            quote,
        } = self.payable(student_email, session_id)?;

        let payment = Payment {
            id: Ulid::new(),
            session_id: session.id,
            tutor_id: tutor.id,
            student_id: student.id,
            amount: quote.amount,
            platform_fee: quote.platform_fee,
            method: PaymentMethod::Card,
            status: PaymentStatus::Pending,
            reference: None,
        };
        self.commit(vec![Event::PaymentRecorded {
            payment: payment.clone(),
        }])
        .await?;
        metrics::counter!(crate::observability::PAYMENTS_TOTAL, "outcome" => "pending").increment(1);
        Ok(payment)
    }
}
