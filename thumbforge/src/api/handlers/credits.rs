//! HTTP handlers for explicit credit debits.

use axum::{Json, extract::State};

use crate::{
    AppState,
    api::models::credits::{DecrementRequest, DecrementResponse},
    auth::CurrentUser,
    db::handlers::{Credits, Profiles, credits::generation_debit},
    errors::{Error, Result},
};

/// Debit the caller's balance
#[utoipa::path(
    post,
    path = "/credits/decrement",
    tag = "credits",
    summary = "Decrement credits",
    description = "Debits the caller's balance by `count` and appends the audit entry. \
                   The sufficiency check and the write are one atomic conditional update.",
    request_body = DecrementRequest,
    responses(
        (status = 200, description = "Balance debited", body = DecrementResponse),
        (status = 400, description = "Invalid count"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Insufficient credits"),
        (status = 404, description = "Profile not found"),
        (status = 500, description = "Internal server error"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn decrement(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(body): Json<DecrementRequest>,
) -> Result<Json<DecrementResponse>> {
    if body.count < 1 {
        return Err(Error::Validation {
            message: "count is required and must be positive".to_string(),
        });
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    // Distinguish a missing profile (404) from an insufficient balance (403)
    Profiles::new(&mut tx).get(user.id).await?.ok_or_else(|| Error::NotFound {
        resource: "Profile".to_string(),
        id: user.id.to_string(),
    })?;

    let new_credits = Profiles::new(&mut tx)
        .try_debit(user.id, body.count)
        .await?
        .ok_or_else(|| Error::Forbidden {
            message: "Insufficient credits".to_string(),
        })?;

    Credits::new(&mut tx)
        .create_transaction(&generation_debit(user.id, body.count))
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(DecrementResponse {
        success: true,
        new_credits,
    }))
}
