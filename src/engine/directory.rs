use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::info;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::store::normalize_email;
use super::{Engine, EngineError};

fn validate_identity(name: &str, email: &str) -> Result<(), EngineError> {
    if name.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("name too long"));
    }
    if email.len() > MAX_EMAIL_LEN {
        return Err(EngineError::LimitExceeded("email too long"));
    }
    if name.trim().is_empty() {
        return Err(EngineError::BadRequest("name must not be empty".into()));
    }
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(EngineError::BadRequest(format!("invalid email: {email}")));
    }
    Ok(())
}

impl Engine {
    pub async fn register_tutor(
        &self,
        name: &str,
        email: &str,
        hourly_rate: Decimal,
    ) -> Result<Tutor, EngineError> {
        validate_identity(name, email)?;
        if hourly_rate <= Decimal::ZERO {
            return Err(EngineError::BadRequest("hourly rate must be positive".into()));
        }
        if hourly_rate > Decimal::from(MAX_HOURLY_RATE) {
            return Err(EngineError::LimitExceeded("hourly rate too high"));
        }

        let _directory = self.directory_lock.lock().await;
        if self.store.account(email).is_some() {
            return Err(EngineError::BadRequest(format!("email already registered: {email}")));
        }
        let tutor = Tutor {
            id: Ulid::new(),
            name: name.trim().to_string(),
            email: normalize_email(email),
            hourly_rate,
        };
        self.commit(vec![Event::TutorRegistered {
            id: tutor.id,
            name: tutor.name.clone(),
            email: tutor.email.clone(),
            hourly_rate,
        }])
        .await?;
        info!("registered tutor {} <{}>", tutor.id, tutor.email);
        Ok(tutor)
    }

    pub async fn register_student(&self, name: &str, email: &str) -> Result<Student, EngineError> {
        validate_identity(name, email)?;

        let _directory = self.directory_lock.lock().await;
        if self.store.account(email).is_some() {
            return Err(EngineError::BadRequest(format!("email already registered: {email}")));
        }
        let student = Student {
            id: Ulid::new(),
            name: name.trim().to_string(),
            email: normalize_email(email),
        };
        self.commit(vec![Event::StudentRegistered {
            id: student.id,
            name: student.name.clone(),
            email: student.email.clone(),
        }])
        .await?;
        info!("registered student {} <{}>", student.id, student.email);
        Ok(student)
    }

    /// Declare a bookable window. Overlap with existing windows is not checked.
    pub async fn add_availability(
        &self,
        tutor_id: Ulid,
        date: NaiveDate,
        slot: Slot,
    ) -> Result<AvailabilityWindow, EngineError> {
        if !slot.is_valid() {
            return Err(EngineError::BadRequest(
                "end time must be after start time".into(),
            ));
        }
        let lock = self
            .store
            .tutor_lock(&tutor_id)
            .ok_or_else(|| EngineError::NotFound(format!("tutor not found: {tutor_id}")))?;
        let _guard = lock.lock().await;
        if self.store.window_count(tutor_id, date) >= MAX_WINDOWS_PER_TUTOR_DAY {
            return Err(EngineError::LimitExceeded("too many availability windows on date"));
        }

        let window = AvailabilityWindow {
            id: Ulid::new(),
            tutor_id,
            date,
            slot,
        };
        self.commit(vec![Event::WindowAdded {
            id: window.id,
            tutor_id,
            date,
            slot,
        }])
        .await?;
        Ok(window)
    }
}
