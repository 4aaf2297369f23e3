//! OpenAPI document aggregation.

use utoipa::OpenApi;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};

use crate::api;
use crate::api::models::{
    credits::{DecrementRequest, DecrementResponse},
    generate::{GenerateRequest, GenerateResponse, GenerateStatusResponse},
    payments::WebhookAck,
    storage::{DeleteGenerationRequest, DeleteGenerationResponse, GenerationResponse},
};
use crate::db::models::{credits::TransactionType, profiles::SubscriptionTier};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Thumbforge API",
        description = "Credit-metered thumbnail generation service"
    ),
    paths(
        api::handlers::generate::generate,
        api::handlers::generate::status,
        api::handlers::credits::decrement,
        api::handlers::storage::list_generations,
        api::handlers::storage::delete_generation,
        api::handlers::payments::webhook,
    ),
    components(schemas(
        GenerateRequest,
        GenerateResponse,
        GenerateStatusResponse,
        DecrementRequest,
        DecrementResponse,
        GenerationResponse,
        DeleteGenerationRequest,
        DeleteGenerationResponse,
        WebhookAck,
        TransactionType,
        SubscriptionTier,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "generate", description = "Thumbnail generation"),
        (name = "credits", description = "Credit ledger"),
        (name = "storage", description = "Stored generations"),
        (name = "payments", description = "Payment reconciliation"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "BearerAuth",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).bearer_format("JWT").build()),
            );
        }
    }
}
