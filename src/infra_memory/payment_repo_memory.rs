use crate::application_port::PaymentError;
use crate::domain_model::*;
use crate::domain_port::PaymentRepo;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};

pub struct MemoryPaymentRepo {
    payments: DashMap<PaymentId, PaymentRecord>,
    next_id: AtomicI64,
}

impl MemoryPaymentRepo {
    pub fn new() -> Self {
        MemoryPaymentRepo {
            payments: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    pub fn payments_of(&self, user_id: UserId) -> Vec<PaymentRecord> {
        self.payments
            .iter()
            .filter(|p| p.user_id == user_id)
            .map(|p| p.value().clone())
            .collect()
    }
}

impl Default for MemoryPaymentRepo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PaymentRepo for MemoryPaymentRepo {
    async fn create(&self, user_id: UserId, amount: f64) -> Result<PaymentRecord, PaymentError> {
        let record = PaymentRecord {
            id: PaymentId(self.next_id.fetch_add(1, Ordering::Relaxed)),
            user_id,
            amount,
            payed: false,
            created_at: Utc::now(),
            payed_at: None,
        };
        self.payments.insert(record.id, record.clone());
        Ok(record)
    }
}
