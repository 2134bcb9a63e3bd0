use crate::domain_model::{PaymentRecord, UserId};

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("amount must be a positive number")]
    InvalidAmount,
    #[error("store error: {0}")]
    Store(String),
}

#[async_trait::async_trait]
pub trait PaymentService: Send + Sync {
    async fn create(&self, user_id: UserId, amount: f64) -> Result<PaymentRecord, PaymentError>;
}
