use crate::application_port::PaymentError;
use crate::domain_model::*;
use crate::domain_port::PaymentRepo;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row};

pub struct MySqlPaymentRepo {
    pool: MySqlPool,
}

impl MySqlPaymentRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlPaymentRepo { pool }
    }
}

#[async_trait::async_trait]
impl PaymentRepo for MySqlPaymentRepo {
    async fn create(&self, user_id: UserId, amount: f64) -> Result<PaymentRecord, PaymentError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PaymentError::Store(e.to_string()))?;

        let result = sqlx::query("INSERT INTO payment (user_id, amount) VALUES (?, ?)")
            .bind(user_id)
            .bind(amount)
            .execute(&mut *tx)
            .await
            .map_err(|e| PaymentError::Store(e.to_string()))?;
        let id = PaymentId(result.last_insert_id() as i64);

        let row = sqlx::query("SELECT payed, created_at, payed_at FROM payment WHERE id = ?")
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| PaymentError::Store(e.to_string()))?;
        let payed: bool = row
            .try_get("payed")
            .map_err(|e| PaymentError::Store(e.to_string()))?;
        let created_at: DateTime<Utc> = row
            .try_get("created_at")
            .map_err(|e| PaymentError::Store(e.to_string()))?;
        let payed_at: Option<DateTime<Utc>> = row
            .try_get("payed_at")
            .map_err(|e| PaymentError::Store(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| PaymentError::Store(e.to_string()))?;

        Ok(PaymentRecord {
            id,
            user_id,
            amount,
            payed,
            created_at,
            payed_at,
        })
    }
}
