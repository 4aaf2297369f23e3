//! Repository for the append-only credit transaction log.

use sqlx::PgConnection;

use crate::db::errors::Result;
use crate::db::models::credits::{CreditTransaction, CreditTransactionCreateDBRequest, TransactionType};
use crate::types::UserId;

const TRANSACTION_COLUMNS: &str = "id, user_id, amount, transaction_type, description, created_at";

pub struct Credits<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Credits<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Append one ledger entry. Entries are never updated or deleted.
    pub async fn create_transaction(&mut self, request: &CreditTransactionCreateDBRequest) -> Result<CreditTransaction> {
        let transaction = sqlx::query_as::<_, CreditTransaction>(&format!(
            "INSERT INTO credit_transactions (user_id, amount, transaction_type, description)
             VALUES ($1, $2, $3, $4)
             RETURNING {TRANSACTION_COLUMNS}"
        ))
        .bind(request.user_id)
        .bind(request.amount)
        .bind(&request.transaction_type)
        .bind(&request.description)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(transaction)
    }

    /// List an account's ledger entries, newest first.
    pub async fn list_for_user(&mut self, user_id: UserId) -> Result<Vec<CreditTransaction>> {
        let transactions = sqlx::query_as::<_, CreditTransaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS}
             FROM credit_transactions
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(transactions)
    }

    /// Signed sum of an account's ledger. Together with the initial free
    /// allotment this should always reproduce the profile balance.
    pub async fn sum_for_user(&mut self, user_id: UserId) -> Result<i64> {
        let sum = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(amount), 0) FROM credit_transactions WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(sum)
    }
}

/// Audit entry for a generation debit.
pub fn generation_debit(user_id: UserId, count: i32) -> CreditTransactionCreateDBRequest {
    CreditTransactionCreateDBRequest {
        user_id,
        amount: -count,
        transaction_type: TransactionType::Generation,
        description: Some(format!("Generated {count} thumbnail(s)")),
    }
}

/// Audit entry for a purchased credit pack.
pub fn purchase_credit(user_id: UserId, credits: i32, pack_name: &str) -> CreditTransactionCreateDBRequest {
    CreditTransactionCreateDBRequest {
        user_id,
        amount: credits,
        transaction_type: TransactionType::Purchase,
        description: Some(format!("Purchased {pack_name} pack")),
    }
}
