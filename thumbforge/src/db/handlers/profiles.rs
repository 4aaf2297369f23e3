//! Repository for account profiles and balance mutations.

use sqlx::PgConnection;

use crate::db::errors::Result;
use crate::db::models::profiles::{Profile, ProfileCreateDBRequest, SubscriptionTier};
use crate::types::UserId;

const PROFILE_COLUMNS: &str = "id, email, full_name, credits, subscription_tier, created_at, updated_at";

pub struct Profiles<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Profiles<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Insert a profile row with its initial free allotment.
    pub async fn create(&mut self, request: &ProfileCreateDBRequest) -> Result<Profile> {
        let profile = sqlx::query_as::<_, Profile>(&format!(
            "INSERT INTO profiles (id, email, full_name, credits)
             VALUES ($1, $2, $3, $4)
             RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(request.id)
        .bind(&request.email)
        .bind(&request.full_name)
        .bind(request.credits)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(profile)
    }

    pub async fn get(&mut self, user_id: UserId) -> Result<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(&format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1"))
            .bind(user_id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(profile)
    }

    /// Resolve an account by the payer email the gateway reported. The
    /// profile table mirrors the auth provider's user list one-to-one.
    pub async fn get_by_email(&mut self, email: &str) -> Result<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(&format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE email = $1"))
            .bind(email)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(profile)
    }

    /// Atomically debit `amount` credits if the balance covers it.
    ///
    /// The sufficiency check and the write are one conditional UPDATE
    /// evaluated by Postgres, so two concurrent debits can never both pass
    /// the check and overdraw. Returns the new balance, or `None` when the
    /// balance was insufficient (or the profile does not exist).
    pub async fn try_debit(&mut self, user_id: UserId, amount: i32) -> Result<Option<i32>> {
        let new_balance = sqlx::query_scalar::<_, i32>(
            "UPDATE profiles
             SET credits = credits - $2, updated_at = now()
             WHERE id = $1 AND credits >= $2
             RETURNING credits",
        )
        .bind(user_id)
        .bind(amount)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(new_balance)
    }

    /// Grant `amount` credits and move the account onto `tier`.
    /// Returns the new balance, or `None` when the profile does not exist.
    pub async fn credit(&mut self, user_id: UserId, amount: i32, tier: &SubscriptionTier) -> Result<Option<i32>> {
        let new_balance = sqlx::query_scalar::<_, i32>(
            "UPDATE profiles
             SET credits = credits + $2, subscription_tier = $3, updated_at = now()
             WHERE id = $1
             RETURNING credits",
        )
        .bind(user_id)
        .bind(amount)
        .bind(tier)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(new_balance)
    }
}
