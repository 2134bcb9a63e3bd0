use super::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct PaymentId(pub i64);

#[derive(Debug, Clone, Serialize)]
pub struct PaymentRecord {
    pub id: PaymentId,
    pub user_id: UserId,
    pub amount: f64,
    pub payed: bool,
    pub created_at: DateTime<Utc>,
    pub payed_at: Option<DateTime<Utc>>,
}
