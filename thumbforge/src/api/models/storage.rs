//! API models for stored generations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::models::generations::Generation;
use crate::types::{GenerationId, UserId};

/// One stored generation, as listed on the storage page.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GenerationResponse {
    #[schema(value_type = Uuid)]
    pub id: GenerationId,
    #[schema(value_type = Uuid)]
    pub user_id: UserId,
    pub prompt: String,
    pub image_url: String,
    pub count: i32,
    pub credits_used: i32,
    pub created_at: DateTime<Utc>,
}

impl From<Generation> for GenerationResponse {
    fn from(generation: Generation) -> Self {
        Self {
            id: generation.id,
            user_id: generation.user_id,
            prompt: generation.prompt,
            image_url: generation.image_url,
            count: generation.count,
            credits_used: generation.credits_used,
            created_at: generation.created_at,
        }
    }
}

/// Body of a delete request: the artifact URL to remove alongside the
/// owning account, which must match the authenticated caller.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteGenerationRequest {
    pub image_url: String,
    #[schema(value_type = Uuid)]
    pub user_id: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeleteGenerationResponse {
    pub success: bool,
}
