pub mod mailer;
pub mod paypal;

pub use mailer::*;
pub use paypal::*;

use crate::error::AppResult;
use async_trait::async_trait;

/// A payment created at the gateway but not yet approved by the payer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedOrder {
    pub external_id: String,
    pub approval_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedOrder {
    pub external_id: String,
    pub state: String,
}

impl ExecutedOrder {
    pub fn is_approved(&self) -> bool {
        self.state.eq_ignore_ascii_case("approved")
    }
}

/// Outbound payment provider. Implementations never retry on their own.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(
        &self,
        amount_cents: i64,
        description: &str,
        return_url: &str,
        cancel_url: &str,
    ) -> AppResult<CreatedOrder>;

    async fn execute_order(&self, external_id: &str, payer_id: &str) -> AppResult<ExecutedOrder>;
}
