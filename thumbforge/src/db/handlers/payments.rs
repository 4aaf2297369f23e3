//! Repository for recorded payments.

use sqlx::PgConnection;

use crate::db::errors::Result;
use crate::db::models::payments::{Payment, PaymentCreateDBRequest};
use crate::types::UserId;

const PAYMENT_COLUMNS: &str = "id, user_id, stripe_payment_id, stripe_session_id, amount, currency, \
                               status, product, credits_added, customer_email, created_at";

pub struct Payments<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Payments<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Record one completed payment.
    ///
    /// The unique constraint on `stripe_session_id` surfaces as
    /// `DbError::UniqueViolation`; the webhook reconciler treats that as
    /// "event already processed".
    pub async fn create(&mut self, request: &PaymentCreateDBRequest) -> Result<Payment> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "INSERT INTO payments
                 (user_id, stripe_payment_id, stripe_session_id, amount, currency,
                  status, product, credits_added, customer_email)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(request.user_id)
        .bind(&request.stripe_payment_id)
        .bind(&request.stripe_session_id)
        .bind(request.amount)
        .bind(&request.currency)
        .bind(&request.status)
        .bind(&request.product)
        .bind(request.credits_added)
        .bind(&request.customer_email)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(payment)
    }

    pub async fn get_by_session(&mut self, session_id: &str) -> Result<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>(&format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE stripe_session_id = $1"))
            .bind(session_id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(payment)
    }

    /// List an account's payments, newest first.
    pub async fn list_for_user(&mut self, user_id: UserId) -> Result<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS}
             FROM payments
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(payments)
    }
}
