//! Database models for recorded payments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::types::{PaymentId, UserId};

/// One completed external payment. Never updated; the unique session id
/// makes the row double as the webhook idempotency marker.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: PaymentId,
    pub user_id: UserId,
    pub stripe_payment_id: Option<String>,
    pub stripe_session_id: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub product: String,
    pub credits_added: i32,
    pub customer_email: String,
    pub created_at: DateTime<Utc>,
}

/// Database request for recording a completed payment
#[derive(Debug, Clone)]
pub struct PaymentCreateDBRequest {
    pub user_id: UserId,
    pub stripe_payment_id: Option<String>,
    pub stripe_session_id: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub product: String,
    pub credits_added: i32,
    pub customer_email: String,
}
