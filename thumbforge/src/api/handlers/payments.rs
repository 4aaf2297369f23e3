//! Payment webhook reconciliation.
//!
//! The gateway delivers checkout completions asynchronously. Events are
//! authenticated by signature before anything else happens; a verified
//! completion is then reconciled into the ledger: payment row first (the
//! unique session id is the idempotency key), then the balance credit and
//! the audit entry, all in one transaction. A replayed event hits the
//! unique constraint and is acknowledged without granting again.

use axum::{
    Json,
    body::Body,
    extract::{FromRequest, Request, State},
    response::{IntoResponse, Response},
};

use crate::{
    AppState,
    api::models::payments::WebhookAck,
    config::StripeConfig,
    db::errors::DbError,
    db::handlers::{Credits, Payments, Profiles, credits::purchase_credit},
    db::models::payments::PaymentCreateDBRequest,
    db::models::profiles::SubscriptionTier,
    errors::{Error, Result},
    stripe::{self, CHECKOUT_SESSION_COMPLETED, CheckoutSession, StripeClient},
};

/// Extractor that verifies webhook signatures before handing the event to
/// the handler. Verification failure rejects the request outright with no
/// further processing.
pub struct StripeEvent(pub stripe::Event);

impl FromRequest<AppState> for StripeEvent {
    type Rejection = Response;

    async fn from_request(req: Request<Body>, state: &AppState) -> std::result::Result<Self, Self::Rejection> {
        let Some(signature) = req.headers().get("stripe-signature").cloned() else {
            tracing::error!("Webhook request without stripe-signature header");
            return Err(Error::Validation {
                message: "No signature".to_string(),
            }
            .into_response());
        };

        let signature = signature.to_str().map_err(|_| {
            Error::Validation {
                message: "Invalid signature".to_string(),
            }
            .into_response()
        })?;
        // Own the header value before the request body is consumed
        let signature = signature.to_string();

        let payload = String::from_request(req, state).await.map_err(IntoResponse::into_response)?;

        let Some(stripe_config) = state.config.stripe() else {
            tracing::error!("Webhook received but no payment provider is configured");
            return Err(Error::Internal {
                operation: "process payment webhook".to_string(),
            }
            .into_response());
        };

        let event = stripe::construct_event(&payload, &signature, &stripe_config.webhook_secret)
            .map_err(IntoResponse::into_response)?;

        Ok(Self(event))
    }
}

/// Reconciliation outcome for a verified checkout completion. Every
/// variant is acknowledged to the gateway; only hard failures (account
/// missing, database down) surface as processing errors so delivery is
/// retried.
enum Outcome {
    Credited,
    AlreadyProcessed,
    UnknownPack,
    NotPaid,
}

/// Payment gateway webhook
#[utoipa::path(
    post,
    path = "/stripe/webhook",
    tag = "payments",
    summary = "Payment webhook",
    description = "Receives checkout completion events from the payment gateway. The event \
                   signature is verified against the endpoint signing secret; reconciliation \
                   credits the purchased pack exactly once per checkout session.",
    responses(
        (status = 200, description = "Event acknowledged", body = WebhookAck),
        (status = 400, description = "Missing or invalid signature"),
        (status = 500, description = "Reconciliation failed; the gateway should retry"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn webhook(State(state): State<AppState>, StripeEvent(event): StripeEvent) -> Result<Json<WebhookAck>> {
    tracing::info!("Received webhook event: {}", event.event_type);

    if event.event_type != CHECKOUT_SESSION_COMPLETED {
        tracing::debug!("Ignoring webhook event type: {}", event.event_type);
        return Ok(Json(WebhookAck { received: true }));
    }

    let stripe_config = state.config.stripe().ok_or_else(|| Error::Internal {
        operation: "process payment webhook".to_string(),
    })?;

    let session: CheckoutSession = match serde_json::from_value(event.data.object.clone()) {
        Ok(session) => session,
        Err(e) => {
            // Signed but malformed: acknowledge so the gateway does not
            // redeliver something we will never be able to parse
            tracing::error!("Expected a checkout session object in event {}: {e}", event.id);
            return Ok(Json(WebhookAck { received: true }));
        }
    };

    match process_checkout_session(&state, stripe_config, &session).await? {
        Outcome::Credited => {
            tracing::info!("Reconciled checkout session {}", session.id);
        }
        Outcome::AlreadyProcessed => {
            tracing::info!("Checkout session {} already processed, skipping", session.id);
        }
        Outcome::UnknownPack => {
            // Logged inside; acknowledged so the gateway does not retry an
            // event that will never map to a pack
        }
        Outcome::NotPaid => {
            tracing::info!("Checkout session {} not paid yet, skipping", session.id);
        }
    }

    Ok(Json(WebhookAck { received: true }))
}

async fn process_checkout_session(state: &AppState, config: &StripeConfig, session: &CheckoutSession) -> Result<Outcome> {
    if let Some(status) = session.payment_status.as_deref()
        && status != "paid"
    {
        return Ok(Outcome::NotPaid);
    }

    // Resolve the purchased pack from the line-item price id. Hosted
    // checkout events usually do not embed line items, so fall back to
    // fetching them from the gateway.
    let price_id = match session.first_price_id() {
        Some(id) => id.to_string(),
        None => {
            let client = StripeClient::new(&config.secret_key, config.api_base.as_deref());
            let items = client.list_line_items(&session.id).await?;
            items
                .first()
                .and_then(|item| item.price.as_ref())
                .map(|price| price.id.clone())
                .ok_or_else(|| Error::Webhook {
                    message: format!("Checkout session {} has no line-item price", session.id),
                })?
        }
    };

    let Some(pack) = config.packs.get(&price_id) else {
        tracing::error!("No pack mapped for price id {price_id}; nothing granted for session {}", session.id);
        return Ok(Outcome::UnknownPack);
    };

    let email = session.payer_email().ok_or_else(|| Error::Webhook {
        message: format!("Checkout session {} has no customer email", session.id),
    })?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let profile = Profiles::new(&mut tx)
        .get_by_email(email)
        .await?
        .ok_or_else(|| Error::Webhook {
            message: format!("No account found for payer email {email}"),
        })?;

    // Insert-first: the unique session id makes a replayed delivery a no-op
    let payment = PaymentCreateDBRequest {
        user_id: profile.id,
        stripe_payment_id: session.payment_intent.clone(),
        stripe_session_id: session.id.clone(),
        amount: session.amount_total.unwrap_or(0),
        currency: session.currency.clone().unwrap_or_else(|| "eur".to_string()),
        status: "succeeded".to_string(),
        product: pack.name.clone(),
        credits_added: pack.credits,
        customer_email: email.to_string(),
    };

    match Payments::new(&mut tx).create(&payment).await {
        Ok(_) => {}
        Err(DbError::UniqueViolation { .. }) => return Ok(Outcome::AlreadyProcessed),
        Err(e) => return Err(e.into()),
    }

    let tier = SubscriptionTier::from_pack_name(&pack.name);
    Profiles::new(&mut tx)
        .credit(profile.id, pack.credits, &tier)
        .await?
        .ok_or_else(|| Error::Webhook {
            message: format!("Profile {} disappeared during credit grant", profile.id),
        })?;

    Credits::new(&mut tx)
        .create_transaction(&purchase_credit(profile.id, pack.credits, &pack.name))
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Outcome::Credited)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::credits::TransactionType;
    use crate::test_utils::*;
    use serde_json::json;
    use sqlx::PgPool;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const STARTER_PRICE: &str = "price_1Sg1IfAD8RQLLuu15Jkwp4UJ";

    fn completed_event(session_id: &str, email: &str, price_id: Option<&str>) -> String {
        let mut session = json!({
            "id": session_id,
            "object": "checkout.session",
            "amount_total": 499,
            "currency": "eur",
            "customer_email": email,
            "customer_details": { "email": email },
            "payment_intent": "pi_test_123",
            "payment_status": "paid",
        });
        if let Some(price_id) = price_id {
            session["line_items"] = json!({ "data": [{ "price": { "id": price_id } }] });
        }

        json!({
            "id": format!("evt_{session_id}"),
            "object": "event",
            "type": "checkout.session.completed",
            "data": { "object": session },
        })
        .to_string()
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_webhook_rejects_missing_or_invalid_signature(pool: PgPool) {
        let app = create_test_app(pool, TestAppOptions::default()).await;
        let payload = completed_event("cs_test_sig", "payer@example.com", Some(STARTER_PRICE));

        let unsigned = app.post("/stripe/webhook").text(payload.clone()).await;
        unsigned.assert_status_bad_request();

        let forged = app
            .post("/stripe/webhook")
            .add_header("stripe-signature", sign_webhook(&payload, "whsec_wrong_secret"))
            .text(payload)
            .await;
        forged.assert_status_bad_request();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_webhook_credits_purchased_pack(pool: PgPool) {
        let app = create_test_app(pool.clone(), TestAppOptions::default()).await;
        let profile = create_test_profile(&pool, 3).await;
        let payload = completed_event("cs_test_grant", &profile.email, Some(STARTER_PRICE));

        let response = app
            .post("/stripe/webhook")
            .add_header("stripe-signature", sign_webhook(&payload, TEST_WEBHOOK_SECRET))
            .text(payload)
            .await;

        response.assert_status_ok();
        let ack: WebhookAck = response.json();
        assert!(ack.received);

        let mut conn = pool.acquire().await.unwrap();
        let refreshed = Profiles::new(&mut conn).get(profile.id).await.unwrap().unwrap();
        assert_eq!(refreshed.credits, 13);
        assert_eq!(refreshed.subscription_tier, SubscriptionTier::Starter);

        let payments = Payments::new(&mut conn).list_for_user(profile.id).await.unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].stripe_session_id, "cs_test_grant");
        assert_eq!(payments[0].credits_added, 10);
        assert_eq!(payments[0].product, "starter");
        assert_eq!(payments[0].customer_email, profile.email);

        let transactions = Credits::new(&mut conn).list_for_user(profile.id).await.unwrap();
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].amount, 10);
        assert_eq!(transactions[0].transaction_type, TransactionType::Purchase);

        // Ledger invariant: transaction sum equals balance minus allotment
        let sum = Credits::new(&mut conn).sum_for_user(profile.id).await.unwrap();
        assert_eq!(sum, (refreshed.credits - 3) as i64);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_webhook_replay_credits_exactly_once(pool: PgPool) {
        let app = create_test_app(pool.clone(), TestAppOptions::default()).await;
        let profile = create_test_profile(&pool, 3).await;
        let payload = completed_event("cs_test_replay", &profile.email, Some(STARTER_PRICE));

        for _ in 0..2 {
            let response = app
                .post("/stripe/webhook")
                .add_header("stripe-signature", sign_webhook(&payload, TEST_WEBHOOK_SECRET))
                .text(payload.clone())
                .await;
            response.assert_status_ok();
        }

        let mut conn = pool.acquire().await.unwrap();
        let refreshed = Profiles::new(&mut conn).get(profile.id).await.unwrap().unwrap();
        assert_eq!(refreshed.credits, 13);

        assert_eq!(Payments::new(&mut conn).list_for_user(profile.id).await.unwrap().len(), 1);
        assert_eq!(Credits::new(&mut conn).list_for_user(profile.id).await.unwrap().len(), 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_webhook_unknown_price_is_acknowledged_without_grant(pool: PgPool) {
        let app = create_test_app(pool.clone(), TestAppOptions::default()).await;
        let profile = create_test_profile(&pool, 3).await;
        let payload = completed_event("cs_test_unknown", &profile.email, Some("price_unmapped"));

        let response = app
            .post("/stripe/webhook")
            .add_header("stripe-signature", sign_webhook(&payload, TEST_WEBHOOK_SECRET))
            .text(payload)
            .await;

        // Acknowledged so the gateway does not retry, but nothing granted
        response.assert_status_ok();

        let mut conn = pool.acquire().await.unwrap();
        let refreshed = Profiles::new(&mut conn).get(profile.id).await.unwrap().unwrap();
        assert_eq!(refreshed.credits, 3);
        assert!(Payments::new(&mut conn).list_for_user(profile.id).await.unwrap().is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_webhook_unknown_account_is_processing_error(pool: PgPool) {
        let app = create_test_app(pool, TestAppOptions::default()).await;
        let payload = completed_event("cs_test_noacct", "stranger@example.com", Some(STARTER_PRICE));

        let response = app
            .post("/stripe/webhook")
            .add_header("stripe-signature", sign_webhook(&payload, TEST_WEBHOOK_SECRET))
            .text(payload)
            .await;

        // Processing errors surface 500 so the gateway retries delivery
        response.assert_status(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_webhook_ignores_other_event_types(pool: PgPool) {
        let app = create_test_app(pool.clone(), TestAppOptions::default()).await;
        let profile = create_test_profile(&pool, 3).await;
        let payload = json!({
            "id": "evt_other",
            "object": "event",
            "type": "invoice.paid",
            "data": { "object": { "id": "in_test" } },
        })
        .to_string();

        let response = app
            .post("/stripe/webhook")
            .add_header("stripe-signature", sign_webhook(&payload, TEST_WEBHOOK_SECRET))
            .text(payload)
            .await;

        response.assert_status_ok();

        let mut conn = pool.acquire().await.unwrap();
        let refreshed = Profiles::new(&mut conn).get(profile.id).await.unwrap().unwrap();
        assert_eq!(refreshed.credits, 3);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_webhook_fetches_line_items_when_not_embedded(pool: PgPool) {
        let stripe_api = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/checkout/sessions/cs_test_fetch/line_items"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "list",
                "data": [{ "id": "li_1", "object": "item", "price": { "id": STARTER_PRICE } }],
            })))
            .expect(1)
            .mount(&stripe_api)
            .await;

        let app = create_test_app(
            pool.clone(),
            TestAppOptions {
                stripe_api_base: Some(stripe_api.uri()),
                ..Default::default()
            },
        )
        .await;
        let profile = create_test_profile(&pool, 0).await;
        let payload = completed_event("cs_test_fetch", &profile.email, None);

        let response = app
            .post("/stripe/webhook")
            .add_header("stripe-signature", sign_webhook(&payload, TEST_WEBHOOK_SECRET))
            .text(payload)
            .await;

        response.assert_status_ok();

        let mut conn = pool.acquire().await.unwrap();
        let refreshed = Profiles::new(&mut conn).get(profile.id).await.unwrap().unwrap();
        assert_eq!(refreshed.credits, 10);
    }
}
