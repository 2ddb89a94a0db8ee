#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    NotFound(String),
    BadRequest(String),
    Forbidden(String),
    PaymentRejected(String),
    LimitExceeded(&'static str),
    WalError(String),
}

impl EngineError {
    /// Stable label for the failure kind, used on the wire and in metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::NotFound(_) => "NotFound",
            EngineError::BadRequest(_) => "BadRequest",
            EngineError::Forbidden(_) => "Forbidden",
            EngineError::PaymentRejected(_) => "PaymentRejected",
            EngineError::LimitExceeded(_) => "LimitExceeded",
            EngineError::WalError(_) => "Internal",
        }
    }

    /// Human-readable message without the kind prefix.
    pub fn message(&self) -> String {
        match self {
            EngineError::NotFound(m)
            | EngineError::BadRequest(m)
            | EngineError::Forbidden(m)
            | EngineError::PaymentRejected(m) => m.clone(),
            EngineError::LimitExceeded(m) => format!("limit exceeded: {m}"),
            // I/O detail stays in the logs.
            EngineError::WalError(_) => "internal storage error".into(),
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(m) => write!(f, "not found: {m}"),
            EngineError::BadRequest(m) => write!(f, "bad request: {m}"),
            EngineError::Forbidden(m) => write!(f, "forbidden: {m}"),
            EngineError::PaymentRejected(m) => write!(f, "payment rejected: {m}"),
            EngineError::LimitExceeded(m) => write!(f, "limit exceeded: {m}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
