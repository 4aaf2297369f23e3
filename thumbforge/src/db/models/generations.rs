//! Database models for stored generations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::types::{GenerationId, UserId};

/// One stored artifact.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Generation {
    pub id: GenerationId,
    pub user_id: UserId,
    pub prompt: String,
    pub image_url: String,
    pub count: i32,
    pub credits_used: i32,
    pub created_at: DateTime<Utc>,
}

/// Database request for recording one stored artifact
#[derive(Debug, Clone)]
pub struct GenerationCreateDBRequest {
    pub user_id: UserId,
    pub prompt: String,
    pub image_url: String,
    pub credits_used: i32,
}
