pub mod stripe;

use async_trait::async_trait;

use crate::models::{Booking, PaymentKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest<'a> {
    pub booking: &'a Booking,
    pub kind: PaymentKind,
    pub amount_cents: i64,
    pub success_url: String,
    pub cancel_url: String,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: CheckoutRequest<'_>,
    ) -> anyhow::Result<CheckoutSession>;
}
