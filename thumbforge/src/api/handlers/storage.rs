//! HTTP handlers for stored generations.

use axum::{
    Json,
    extract::{Path, State},
};

use crate::{
    AppState,
    api::models::storage::{DeleteGenerationRequest, DeleteGenerationResponse, GenerationResponse},
    auth::CurrentUser,
    db::handlers::Generations,
    errors::{Error, Result},
    types::GenerationId,
};

/// List the caller's generations
#[utoipa::path(
    get,
    path = "/storage",
    tag = "storage",
    summary = "List stored generations",
    responses(
        (status = 200, description = "The caller's generations, newest first", body = [GenerationResponse]),
        (status = 401, description = "Not authenticated"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn list_generations(State(state): State<AppState>, user: CurrentUser) -> Result<Json<Vec<GenerationResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let generations = Generations::new(&mut conn).list_for_user(user.id).await?;

    Ok(Json(generations.into_iter().map(GenerationResponse::from).collect()))
}

/// Delete one generation: the stored artifact, then the record
#[utoipa::path(
    delete,
    path = "/storage/{id}",
    tag = "storage",
    summary = "Delete a stored generation",
    params(("id" = Uuid, Path, description = "Generation ID")),
    request_body = DeleteGenerationRequest,
    responses(
        (status = 200, description = "Generation deleted", body = DeleteGenerationResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Body user does not match the caller"),
        (status = 404, description = "Generation not found"),
        (status = 500, description = "Internal server error"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %user.id, generation_id = %id))]
pub async fn delete_generation(
    State(state): State<AppState>,
    Path(id): Path<GenerationId>,
    user: CurrentUser,
    Json(body): Json<DeleteGenerationRequest>,
) -> Result<Json<DeleteGenerationResponse>> {
    if body.user_id != user.id {
        return Err(Error::Forbidden {
            message: "Cannot delete another user's generation".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let generation = Generations::new(&mut conn).get(id).await?.ok_or_else(|| Error::NotFound {
        resource: "Generation".to_string(),
        id: id.to_string(),
    })?;

    // Return 404 for foreign rows to avoid leaking existence
    if generation.user_id != user.id {
        return Err(Error::NotFound {
            resource: "Generation".to_string(),
            id: id.to_string(),
        });
    }

    // Storage deletion is best-effort; the record is removed regardless
    if let Err(e) = state.store.delete(&generation.image_url).await {
        tracing::error!("Failed to delete stored artifact {}: {e:#}", generation.image_url);
    }

    Generations::new(&mut conn).delete(id).await?;

    Ok(Json(DeleteGenerationResponse { success: true }))
}
