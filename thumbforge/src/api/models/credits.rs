//! API models for the credit endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Explicit debit request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DecrementRequest {
    /// Number of credits to debit; must be positive
    pub count: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DecrementResponse {
    pub success: bool,
    /// Balance after the debit
    pub new_credits: i32,
}
