//! Test utilities for integration testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum_test::TestServer;
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::ai::GeminiClient;
use crate::config::{AiConfig, AuthConfig, Config, LimitsConfig, PaymentConfig, StripeConfig};
use crate::db::handlers::Profiles;
use crate::db::models::profiles::{Profile, ProfileCreateDBRequest};
use crate::limits::Limiters;
use crate::storage::build_public_url;
use crate::{AppState, build_router};

pub use crate::storage::ArtifactStore;

pub const TEST_JWT_SECRET: &str = "test-secret-key-for-testing-only";
pub const TEST_WEBHOOK_SECRET: &str = "whsec_test_secret";

/// Knobs a test can turn on the app under test.
pub struct TestAppOptions {
    pub ai_base_url: String,
    pub store: Arc<dyn ArtifactStore>,
    pub generations_per_hour: u32,
    pub stripe_api_base: Option<String>,
}

impl Default for TestAppOptions {
    fn default() -> Self {
        Self {
            // Unroutable by default: tests that reach the provider inject a mock
            ai_base_url: "http://127.0.0.1:1".to_string(),
            store: Arc::new(MemoryStore::new()),
            generations_per_hour: 10,
            stripe_api_base: None,
        }
    }
}

pub fn create_test_config(options: &TestAppOptions) -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        auth: AuthConfig {
            jwt_secret: TEST_JWT_SECRET.to_string(),
        },
        ai: AiConfig {
            api_key: "test-key".to_string(),
            model: "gemini-3-pro-image-preview".to_string(),
            base_url: options.ai_base_url.clone(),
        },
        payment: Some(PaymentConfig::Stripe(StripeConfig {
            secret_key: "sk_test_key".to_string(),
            webhook_secret: TEST_WEBHOOK_SECRET.to_string(),
            api_base: options.stripe_api_base.clone(),
            ..Default::default()
        })),
        limits: LimitsConfig {
            generations_per_hour: options.generations_per_hour,
        },
        ..Default::default()
    }
}

pub async fn create_test_app(pool: PgPool, options: TestAppOptions) -> TestServer {
    let config = create_test_config(&options);

    let state = AppState::builder()
        .db(pool)
        .ai(Arc::new(GeminiClient::new(&config.ai)))
        .store(options.store)
        .limiters(Limiters::new(&config.limits))
        .config(config)
        .build();

    let router = build_router(state).expect("Failed to build router");
    TestServer::new(router).expect("Failed to start test server")
}

/// Insert a profile row with the given balance.
pub async fn create_test_profile(pool: &PgPool, credits: i32) -> Profile {
    let id = Uuid::new_v4();
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");

    Profiles::new(&mut conn)
        .create(&ProfileCreateDBRequest {
            id,
            email: format!("user-{id}@example.com"),
            full_name: None,
            credits,
        })
        .await
        .expect("Failed to create profile")
}

/// An authenticated identity with no profile row behind it.
pub struct TestIdentity {
    pub id: Uuid,
    pub email: String,
}

pub fn unregistered_user() -> TestIdentity {
    let id = Uuid::new_v4();
    TestIdentity {
        id,
        email: format!("ghost-{id}@example.com"),
    }
}

fn bearer_token(id: Uuid, email: &str) -> String {
    let exp = chrono::Utc::now().timestamp() + 3600;
    let claims = json!({ "sub": id.to_string(), "email": email, "exp": exp });
    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()))
        .expect("Failed to encode test token");
    format!("Bearer {token}")
}

pub fn bearer(profile: &Profile) -> String {
    bearer_token(profile.id, &profile.email)
}

pub fn bearer_for(identity: &TestIdentity) -> String {
    bearer_token(identity.id, &identity.email)
}

/// Sign a webhook payload the way the gateway would, stamped now.
pub fn sign_webhook(payload: &str, secret: &str) -> String {
    crate::stripe::signature_header(chrono::Utc::now().timestamp(), payload, secret)
}

/// In-memory artifact store.
pub struct MemoryStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub const PUBLIC_BASE: &'static str = "https://cdn.test/generations";

    pub fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
        }
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn put(&self, key: &str, _content_type: &str, bytes: Vec<u8>) -> anyhow::Result<String> {
        self.objects.lock().unwrap().insert(key.to_string(), bytes);
        Ok(build_public_url(Self::PUBLIC_BASE, key))
    }

    async fn delete(&self, url: &str) -> anyhow::Result<()> {
        let prefix = format!("{}/", Self::PUBLIC_BASE);
        if let Some(key) = url.strip_prefix(&prefix) {
            self.objects.lock().unwrap().remove(key);
        }
        Ok(())
    }
}

/// Store that accepts a fixed number of uploads and then fails, for
/// exercising the mid-batch persistence fallback.
pub struct FailingStore {
    inner: MemoryStore,
    allowed_puts: usize,
    puts: AtomicUsize,
}

impl FailingStore {
    pub fn failing_after(allowed_puts: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            allowed_puts,
            puts: AtomicUsize::new(0),
        }
    }

    pub fn object_count(&self) -> usize {
        self.inner.object_count()
    }
}

#[async_trait]
impl ArtifactStore for FailingStore {
    async fn put(&self, key: &str, content_type: &str, bytes: Vec<u8>) -> anyhow::Result<String> {
        let attempt = self.puts.fetch_add(1, Ordering::SeqCst);
        if attempt >= self.allowed_puts {
            anyhow::bail!("storage quota exceeded");
        }
        self.inner.put(key, content_type, bytes).await
    }

    async fn delete(&self, url: &str) -> anyhow::Result<()> {
        self.inner.delete(url).await
    }
}

fn gemini_image_response() -> serde_json::Value {
    json!({
        "candidates": [{
            "content": {
                "role": "model",
                "parts": [
                    { "inlineData": { "mimeType": "image/png", "data": "aW1hZ2U=" } }
                ]
            }
        }]
    })
}

/// Mock generation provider answering up to `max_calls` requests with one
/// inline image each.
pub async fn mock_gemini_server(max_calls: u64) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-3-pro-image-preview:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_image_response()))
        .expect(0..=max_calls)
        .mount(&server)
        .await;
    server
}

/// Mock generation provider that always fails with `status` and `message`.
pub async fn mock_gemini_failure(status: u16, message: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(status).set_body_string(message.to_string()))
        .mount(&server)
        .await;
    server
}
