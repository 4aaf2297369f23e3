//! API models for payment webhooks.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Acknowledgement returned to the payment gateway once a webhook's
/// signature has been verified.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookAck {
    pub received: bool,
}
