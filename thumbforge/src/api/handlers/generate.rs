//! HTTP handlers for thumbnail generation.
//!
//! The generation endpoint runs the credit reservation flow:
//! validate → rate-limit → balance check (with clamping) → provider calls
//! → persist-all-then-debit. Persistence failures are deliberately not
//! surfaced to the caller: the artifacts are delivered unstored and
//! undebited, and the batch is flagged for reconciliation.

use axum::{Json, extract::State};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;

use crate::{
    AppState, ai,
    api::models::generate::{GenerateRequest, GenerateResponse, GenerateStatusResponse},
    auth::CurrentUser,
    db::handlers::{Credits, Generations, Profiles, credits::generation_debit},
    db::models::generations::GenerationCreateDBRequest,
    errors::{Error, Result},
    storage, validation,
    validation::ValidatedGeneration,
};

/// Generate thumbnails for the caller
#[utoipa::path(
    post,
    path = "/generate",
    tag = "generate",
    summary = "Generate thumbnails",
    description = "Validates the request, reserves credits, calls the generation provider, \
                   stores the artifacts, and debits the ledger. When the balance covers only \
                   part of the requested count, the count is clamped down instead of rejected.",
    request_body = GenerateRequest,
    responses(
        (status = 200, description = "Generated artifact references", body = GenerateResponse),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Not authenticated"),
        (status = 402, description = "No credits remaining"),
        (status = 404, description = "Profile not found"),
        (status = 429, description = "Generation limit reached"),
        (status = 500, description = "Generation provider failure"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn generate(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(body): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>> {
    let mut validated = validation::validate_generate(&body)?;

    if let Some(limiter) = &state.limiters.generations {
        limiter.check(user.id)?;
    }

    let profile = {
        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        Profiles::new(&mut conn)
            .get(user.id)
            .await?
            .ok_or_else(|| Error::NotFound {
                resource: "Profile".to_string(),
                id: user.id.to_string(),
            })?
    };

    if profile.credits == 0 {
        return Err(Error::InsufficientCredits);
    }

    if profile.credits < validated.count {
        // Partial fulfillment: deliver what the balance covers
        tracing::info!(
            requested = validated.count,
            available = profile.credits,
            "Clamping requested count to available balance"
        );
        validated.count = profile.credits;
    }

    // The dominant latency and failure surface; any failure aborts the request
    let artifacts = state.ai.generate(&validated).await?;

    match persist_and_debit(&state, &user, &validated, &artifacts).await {
        Ok(urls) => Ok(Json(GenerateResponse { images: urls })),
        Err(reason) => {
            // Don't block the user on our storage problems: deliver the raw
            // artifacts, skip the debit, and leave a flag for reconciliation.
            tracing::warn!("Persistence failed, delivering unbilled batch: {reason:#}");
            flag_unbilled(&state, &user, &validated, &reason.to_string()).await;
            Ok(Json(GenerateResponse { images: artifacts }))
        }
    }
}

/// Upload every artifact, then record rows and debit the ledger in one
/// database transaction. Either the whole batch is persisted and billed,
/// or nothing is: partial failures unwind the uploads already made.
async fn persist_and_debit(
    state: &AppState,
    user: &CurrentUser,
    validated: &ValidatedGeneration,
    artifacts: &[String],
) -> anyhow::Result<Vec<String>> {
    let mut uploaded: Vec<String> = Vec::with_capacity(artifacts.len());

    for (index, artifact) in artifacts.iter().enumerate() {
        match upload_artifact(state, user, index, artifact).await {
            Ok(url) => uploaded.push(url),
            Err(e) => {
                discard_uploads(state, &uploaded).await;
                return Err(e);
            }
        }
    }

    if let Err(e) = record_batch(state, user, validated, &uploaded).await {
        discard_uploads(state, &uploaded).await;
        return Err(e);
    }

    Ok(uploaded)
}

async fn upload_artifact(state: &AppState, user: &CurrentUser, index: usize, artifact: &str) -> anyhow::Result<String> {
    let inline = ai::parse_data_url(artifact);
    let bytes = BASE64_STANDARD
        .decode(inline.data.as_bytes())
        .map_err(|e| anyhow::anyhow!("Artifact payload is not valid base64: {e}"))?;

    let key = storage::artifact_key(user.id, index, &inline.mime_type);
    state.store.put(&key, &inline.mime_type, bytes).await
}

/// Insert one generation row per stored artifact and debit the batch,
/// atomically. The conditional debit re-checks the balance, so a
/// concurrent spend between the initial read and this point rolls the
/// whole batch back instead of overdrawing.
async fn record_batch(
    state: &AppState,
    user: &CurrentUser,
    validated: &ValidatedGeneration,
    urls: &[String],
) -> anyhow::Result<()> {
    let count = urls.len() as i32;
    let mut tx = state.db.begin().await?;

    for url in urls {
        Generations::new(&mut tx)
            .create(&GenerationCreateDBRequest {
                user_id: user.id,
                prompt: validated.prompt.clone(),
                image_url: url.clone(),
                credits_used: 1,
            })
            .await?;
    }

    let debited = Profiles::new(&mut tx).try_debit(user.id, count).await?;
    if debited.is_none() {
        anyhow::bail!("balance no longer covers the batch debit");
    }

    Credits::new(&mut tx).create_transaction(&generation_debit(user.id, count)).await?;

    tx.commit().await?;
    Ok(())
}

/// Best-effort removal of artifacts uploaded before a batch failed.
async fn discard_uploads(state: &AppState, urls: &[String]) {
    for url in urls {
        if let Err(e) = state.store.delete(url).await {
            tracing::error!("Failed to discard partially uploaded artifact {url}: {e:#}");
        }
    }
}

/// Best-effort reconciliation flag for a delivered-but-unbilled batch.
async fn flag_unbilled(state: &AppState, user: &CurrentUser, validated: &ValidatedGeneration, reason: &str) {
    let result = async {
        let mut conn = state.db.acquire().await?;
        Generations::new(&mut conn)
            .flag_unbilled(user.id, &validated.prompt, validated.count, reason)
            .await?;
        Ok::<_, anyhow::Error>(())
    }
    .await;

    if let Err(e) = result {
        tracing::error!("Failed to record unbilled generation for {}: {e:#}", user.id);
    }
}

/// Liveness probe for the generation API
#[utoipa::path(
    get,
    path = "/generate",
    tag = "generate",
    summary = "Generation API status",
    responses((status = 200, description = "API reachable", body = GenerateStatusResponse))
)]
pub async fn status() -> Json<GenerateStatusResponse> {
    Json(GenerateStatusResponse {
        status: "ok".to_string(),
        message: "Thumbnail generation API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
