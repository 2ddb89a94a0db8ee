//! JSON-lines request/response protocol over TCP.
//!
//! Each request is one JSON object on its own line, tagged by `"op"`. Each
//! gets exactly one response line: `{"ok":true,"data":...}` or
//! `{"ok":false,"error":{"kind":...,"message":...}}`. The caller's identity
//! travels in the request; authenticating it happens in front of this layer.

use std::io;
use std::sync::Arc;
use std::time::Instant;

use chrono::{NaiveDate, NaiveTime};
use futures::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use ulid::Ulid;

use crate::engine::{Engine, EngineError};
use crate::limits::MAX_LINE_LEN;
use crate::model::*;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    RegisterTutor {
        name: String,
        email: String,
        hourly_rate: Decimal,
    },
    RegisterStudent {
        name: String,
        email: String,
    },
    AddAvailability {
        tutor_id: Ulid,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    },
    ListAvailability {
        tutor_id: Ulid,
        date: NaiveDate,
    },
    RequestSession {
        student_email: String,
        tutor_id: Ulid,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    },
    ConfirmPayment {
        student_email: String,
        session_id: Ulid,
        method: PaymentMethod,
        token: Option<String>,
    },
    CreatePendingPayment {
        student_email: String,
        session_id: Ulid,
    },
    GetSession {
        email: String,
        session_id: Ulid,
    },
    ListSessions {
        email: String,
    },
    PaymentHistory {
        email: String,
    },
}

impl Request {
    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Request::RegisterTutor { .. } => "register_tutor",
            Request::RegisterStudent { .. } => "register_student",
            Request::AddAvailability { .. } => "add_availability",
            Request::ListAvailability { .. } => "list_availability",
            Request::RequestSession { .. } => "request_session",
            Request::ConfirmPayment { .. } => "confirm_payment",
            Request::CreatePendingPayment { .. } => "create_pending_payment",
            Request::GetSession { .. } => "get_session",
            Request::ListSessions { .. } => "list_sessions",
            Request::PaymentHistory { .. } => "payment_history",
        }
    }
}

fn ok<T: Serialize>(data: T) -> Value {
    json!({ "ok": true, "data": data })
}

fn failure(kind: &str, message: &str) -> Value {
    json!({ "ok": false, "error": { "kind": kind, "message": message } })
}

fn engine_err(e: &EngineError) -> Value {
    failure(e.kind(), &e.message())
}

fn to_value<T: Serialize>(result: Result<T, EngineError>) -> Value {
    match result {
        Ok(data) => ok(data),
        Err(e) => engine_err(&e),
    }
}

pub async fn execute(engine: &Engine, request: Request) -> Value {
    match request {
        Request::RegisterTutor {
            name,
            email,
            hourly_rate,
        } => to_value(engine.register_tutor(&name, &email, hourly_rate).await),
        Request::RegisterStudent { name, email } => {
            to_value(engine.register_student(&name, &email).await)
        }
        Request::AddAvailability {
            tutor_id,
            date,
            start,
            end,
        } => to_value(
            engine
                .add_availability(tutor_id, date, Slot::new(start, end))
                .await,
        ),
        Request::ListAvailability { tutor_id, date } => {
            to_value(engine.availability_for(tutor_id, date))
        }
        Request::RequestSession {
            student_email,
            tutor_id,
            date,
            start,
            end,
        } => to_value(
            engine
                .request_session(&student_email, tutor_id, date, Slot::new(start, end))
                .await,
        ),
        Request::ConfirmPayment {
            student_email,
            session_id,
            method,
            token,
        } => to_value(
            engine
                .confirm_payment(&student_email, session_id, method, token.as_deref())
                .await,
        ),
        Request::CreatePendingPayment {
            student_email,
            session_id,
        } => to_value(engine.create_pending_payment(&student_email, session_id).await),
        Request::GetSession { email, session_id } => {
            to_value(engine.session_for(&email, session_id))
        }
        Request::ListSessions { email } => to_value(engine.sessions_for(&email)),
        Request::PaymentHistory { email } => ok(engine.payment_history(&email)),
    }
}

/// Parse and run one request line, recording RED metrics.
pub async fn handle_line(engine: &Engine, line: &str) -> Value {
    let request: Request = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => {
            metrics::counter!(crate::observability::REQUESTS_TOTAL, "op" => "invalid", "status" => "error")
                .increment(1);
            return failure("BadRequest", &format!("malformed request: {e}"));
        }
    };

    let op = request.label();
    let start = Instant::now();
    let response = execute(engine, request).await;
    let status = if response["ok"] == Value::Bool(true) { "ok" } else { "error" };
    metrics::counter!(crate::observability::REQUESTS_TOTAL, "op" => op, "status" => status)
        .increment(1);
    metrics::histogram!(crate::observability::REQUEST_DURATION_SECONDS, "op" => op)
        .record(start.elapsed().as_secs_f64());
    response
}

fn codec_err(e: LinesCodecError) -> io::Error {
    match e {
        LinesCodecError::Io(e) => e,
        other => io::Error::new(io::ErrorKind::InvalidData, other),
    }
}

/// Serve one client until it disconnects.
pub async fn process_connection(socket: TcpStream, engine: Arc<Engine>) -> io::Result<()> {
    let mut framed = Framed::new(socket, LinesCodec::new_with_max_length(MAX_LINE_LEN));

    // After a codec error the stream yields one `None` before it resumes.
    let mut resuming = false;
    loop {
        let frame = match framed.next().await {
            Some(frame) => frame,
            None if resuming => {
                resuming = false;
                continue;
            }
            None => return Ok(()),
        };
        let response = match frame {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => handle_line(&engine, &line).await,
            // The codec discards the rest of the oversized line.
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                resuming = true;
                failure("LimitExceeded", "limit exceeded: request line too long")
            }
            Err(LinesCodecError::Io(e)) => return Err(e),
        };
        framed.send(response.to_string()).await.map_err(codec_err)?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_request_session() {
        let line = r#"{"op":"request_session","student_email":"s@example.com",
            "tutor_id":"01ARZ3NDEKTSV4RRFFQ69G5FAV","date":"2025-06-02",
            "start":"10:00:00","end":"11:00:00"}"#;
        let req: Request = serde_json::from_str(line).unwrap();
        assert_eq!(req.label(), "request_session");
        match req {
            Request::RequestSession { start, end, .. } => {
                assert_eq!(Slot::new(start, end), slot(10, 0, 11, 0));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parse_confirm_payment_without_token() {
        let line = r#"{"op":"confirm_payment","student_email":"s@example.com",
            "session_id":"01ARZ3NDEKTSV4RRFFQ69G5FAV","method":"CARD"}"#;
        let req: Request = serde_json::from_str(line).unwrap();
        assert!(matches!(req, Request::ConfirmPayment { token: None, method: PaymentMethod::Card, .. }));
    }

    #[test]
    fn parse_get_session() {
        let line = r#"{"op":"get_session","email":"s@example.com","session_id":"01ARZ3NDEKTSV4RRFFQ69G5FAV"}"#;
        let req: Request = serde_json::from_str(line).unwrap();
        assert_eq!(req.label(), "get_session");
    }

    #[test]
    fn unknown_op_is_rejected() {
        assert!(serde_json::from_str::<Request>(r#"{"op":"drop_tables"}"#).is_err());
    }

    #[test]
    fn error_envelope_shape() {
        let v = engine_err(&EngineError::Forbidden("nope".into()));
        assert_eq!(v["ok"], false);
        assert_eq!(v["error"]["kind"], "Forbidden");
        assert_eq!(v["error"]["message"], "nope");

        let v = engine_err(&EngineError::WalError("disk on fire".into()));
        assert_eq!(v["error"]["kind"], "Internal");
        assert_eq!(v["error"]["message"], "internal storage error");
    }
}
