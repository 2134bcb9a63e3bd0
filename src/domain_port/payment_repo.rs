use crate::application_port::PaymentError;
use crate::domain_model::*;

#[async_trait::async_trait]
pub trait PaymentRepo: Send + Sync {
    async fn create(&self, user_id: UserId, amount: f64) -> Result<PaymentRecord, PaymentError>;
}
