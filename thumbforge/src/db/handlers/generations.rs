//! Repository for stored generations and unbilled-batch flags.

use sqlx::PgConnection;

use crate::db::errors::Result;
use crate::db::models::generations::{Generation, GenerationCreateDBRequest};
use crate::types::{GenerationId, UserId};

const GENERATION_COLUMNS: &str = "id, user_id, prompt, image_url, count, credits_used, created_at";

pub struct Generations<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Generations<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Record one stored artifact.
    pub async fn create(&mut self, request: &GenerationCreateDBRequest) -> Result<Generation> {
        let generation = sqlx::query_as::<_, Generation>(&format!(
            "INSERT INTO generations (user_id, prompt, image_url, credits_used)
             VALUES ($1, $2, $3, $4)
             RETURNING {GENERATION_COLUMNS}"
        ))
        .bind(request.user_id)
        .bind(&request.prompt)
        .bind(&request.image_url)
        .bind(request.credits_used)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(generation)
    }

    pub async fn get(&mut self, id: GenerationId) -> Result<Option<Generation>> {
        let generation = sqlx::query_as::<_, Generation>(&format!("SELECT {GENERATION_COLUMNS} FROM generations WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(generation)
    }

    /// List an account's generations, newest first.
    pub async fn list_for_user(&mut self, user_id: UserId) -> Result<Vec<Generation>> {
        let generations = sqlx::query_as::<_, Generation>(&format!(
            "SELECT {GENERATION_COLUMNS}
             FROM generations
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(generations)
    }

    /// Delete one generation record. Returns whether a row was removed.
    pub async fn delete(&mut self, id: GenerationId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM generations WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Flag a batch that was delivered to the caller without a ledger
    /// debit, for operator reconciliation.
    pub async fn flag_unbilled(&mut self, user_id: UserId, prompt: &str, count: i32, reason: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO unbilled_generations (user_id, prompt, count, reason)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(user_id)
        .bind(prompt)
        .bind(count)
        .bind(reason)
        .execute(&mut *self.db)
        .await?;

        Ok(())
    }

    /// Number of unbilled-batch flags for an account.
    pub async fn count_unbilled(&mut self, user_id: UserId) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM unbilled_generations WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(count)
    }
}
