//! API models for the generation endpoint.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Generation request body. Images arrive as data-URLs.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    /// Face reference image (required)
    pub face_image_url: Option<String>,
    /// Style inspiration image (required)
    pub inspiration_image_url: Option<String>,
    /// Optional extra reference image
    #[serde(default)]
    pub extra_image_url: Option<String>,
    /// Free-text prompt, at least 10 characters after sanitization
    pub prompt: Option<String>,
    /// Number of thumbnails to produce, 1-4. Defaults to 2.
    #[serde(default)]
    pub count: Option<i32>,
}

/// Generated artifact references: storage URLs when persistence succeeded,
/// raw data-URLs when the service fell back to direct delivery.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GenerateResponse {
    pub images: Vec<String>,
}

/// Liveness payload for the generation API.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GenerateStatusResponse {
    pub status: String,
    pub message: String,
    pub version: String,
}
