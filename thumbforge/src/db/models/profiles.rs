//! Database models for account profiles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::types::UserId;

/// Subscription tier stored as TEXT in the database.
///
/// The tier follows the most recently purchased pack; accounts that never
/// purchased stay on `none`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::Type, PartialEq, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    None,
    Starter,
    Pro,
}

impl SubscriptionTier {
    /// Map a purchased pack name onto a tier. Unknown names leave the
    /// account untiered rather than failing the purchase.
    pub fn from_pack_name(name: &str) -> Self {
        match name {
            "starter" => SubscriptionTier::Starter,
            "pro" => SubscriptionTier::Pro,
            _ => SubscriptionTier::None,
        }
    }
}

/// One account's profile row, mirroring the hosted auth provider's user.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub id: UserId,
    pub email: String,
    pub full_name: Option<String>,
    pub credits: i32,
    pub subscription_tier: SubscriptionTier,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database request for creating a profile (signup mirror and tests).
#[derive(Debug, Clone)]
pub struct ProfileCreateDBRequest {
    pub id: UserId,
    pub email: String,
    pub full_name: Option<String>,
    /// Initial free allotment
    pub credits: i32,
}
