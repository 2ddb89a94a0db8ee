use async_trait::async_trait;
use ulid::Ulid;

/// The only gateway status that counts as a successful charge.
pub const STATUS_SUCCEEDED: &str = "succeeded";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeRequest {
    pub token: String,
    /// Amount in minor currency units (cents).
    pub amount_minor: i64,
    pub currency: &'static str,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeReceipt {
    pub status: String,
    pub reference: String,
}

impl ChargeReceipt {
    pub fn succeeded(&self) -> bool {
        self.status == STATUS_SUCCEEDED
    }
}

#[derive(Debug)]
pub struct GatewayError(pub String);

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "gateway error: {}", self.0)
    }
}

impl std::error::Error for GatewayError {}

/// Remote card processor. Implementations may fail arbitrarily; the engine
/// treats any error (and any timeout) as a declined charge.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeReceipt, GatewayError>;
}

/// Offline gateway with card-processor test-token semantics: tokens starting
/// with `tok_` succeed unless they mention `declined`; anything else is an
/// invalid source.
#[derive(Debug, Default, Clone)]
pub struct SandboxGateway;

#[async_trait]
impl PaymentGateway for SandboxGateway {
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeReceipt, GatewayError> {
        if !request.token.starts_with("tok_") {
            return Err(GatewayError(format!("no such token: {}", request.token)));
        }
        if request.amount_minor <= 0 {
            return Err(GatewayError("amount must be positive".into()));
        }
        let status = if request.token.contains("declined") {
            "failed"
        } else {
            STATUS_SUCCEEDED
        };
        Ok(ChargeReceipt {
            status: status.into(),
            reference: format!("ch_{}", Ulid::new()),
        })
    }
}
