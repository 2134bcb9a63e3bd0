use crate::application_port::{PaymentError, PaymentService};
use crate::domain_model::{PaymentRecord, UserId};
use crate::domain_port::PaymentRepo;
use std::sync::Arc;
use tracing::info;

pub struct RealPaymentService {
    payment_repo: Arc<dyn PaymentRepo>,
}

impl RealPaymentService {
    pub fn new(payment_repo: Arc<dyn PaymentRepo>) -> Self {
        Self { payment_repo }
    }
}

#[async_trait::async_trait]
impl PaymentService for RealPaymentService {
    async fn create(&self, user_id: UserId, amount: f64) -> Result<PaymentRecord, PaymentError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(PaymentError::InvalidAmount);
        }
        let record = self.payment_repo.create(user_id, amount).await?;
        info!(%user_id, payment_id = record.id.0, amount, "payment recorded");
        Ok(record)
    }
}
