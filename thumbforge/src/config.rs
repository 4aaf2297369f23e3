//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides.
//! The configuration file path defaults to `config.yaml` but can be specified
//! via `-f` flag or the `THUMBFORGE_CONFIG` environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources
//! override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `THUMBFORGE_` override YAML values
//! 3. **DATABASE_URL** - Special case: overrides `database.url` if set
//!
//! For nested config values, use double underscores in environment variables.
//! For example, `THUMBFORGE_AI__API_KEY=...` sets the `ai.api_key` field.

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Simple CLI args - just for specifying the config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "THUMBFORGE_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines to catch config errors before deployment.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// This is the root configuration structure loaded from YAML and environment
/// variables. All fields have sensible defaults defined in the `Default`
/// implementation; secrets obviously have to come from the environment.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// PostgreSQL connection settings
    pub database: DatabaseConfig,
    /// Verification settings for the hosted auth provider's bearer tokens
    pub auth: AuthConfig,
    /// Generation provider settings
    pub ai: AiConfig,
    /// Artifact object storage settings
    pub storage: StorageConfig,
    /// Payment provider configuration. None disables the webhook endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentConfig>,
    /// Credit system configuration
    pub credits: CreditsConfig,
    /// Request limiting configuration
    pub limits: LimitsConfig,
    /// CORS configuration
    pub cors: CorsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
            ai: AiConfig::default(),
            storage: StorageConfig::default(),
            payment: None,
            credits: CreditsConfig::default(),
            limits: LimitsConfig::default(),
            cors: CorsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum size of the connection pool
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/thumbforge".to_string(),
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// Shared HS256 secret the hosted auth provider signs its JWTs with
    pub jwt_secret: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AiConfig {
    /// API key for the generation provider
    pub api_key: String,
    /// Model identifier used for thumbnail generation
    pub model: String,
    /// Provider API base URL. Overridable so tests can point at a mock server.
    pub base_url: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gemini-3-pro-image-preview".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Bucket holding generated artifacts
    pub bucket: String,
    /// Custom S3-compatible endpoint (e.g., MinIO). None uses AWS.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Public base URL artifacts are served from. Defaults to the
    /// virtual-hosted AWS URL for the bucket.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_base_url: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: "generations".to_string(),
            endpoint: None,
            public_base_url: None,
        }
    }
}

impl StorageConfig {
    /// Resolved public base URL for stored artifacts.
    pub fn public_base(&self) -> String {
        self.public_base_url
            .clone()
            .unwrap_or_else(|| format!("https://{}.s3.amazonaws.com", self.bucket))
    }
}

/// Payment provider configuration.
///
/// Currently only Stripe is supported; the enum leaves room for others.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum PaymentConfig {
    Stripe(StripeConfig),
}

// No deny_unknown_fields here: the payment provider tag stays visible to
// this struct's deserializer inside the internally-tagged enum.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StripeConfig {
    /// Secret API key used to retrieve checkout session line items
    pub secret_key: String,
    /// Webhook endpoint signing secret used to verify event signatures
    pub webhook_secret: String,
    /// Stripe API base URL. Overridable so tests can point at a mock server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    /// Static price-id -> credit pack table
    pub packs: HashMap<String, Pack>,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            webhook_secret: String::new(),
            api_base: None,
            packs: default_packs(),
        }
    }
}

/// One purchasable credit pack, keyed by its checkout price id.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Pack {
    /// Pack name; doubles as the subscription tier written to the profile
    pub name: String,
    /// Credits granted on purchase
    pub credits: i32,
    /// Price in minor currency units, for the payment record
    pub amount: i64,
}

/// The production packs sold through checkout.
fn default_packs() -> HashMap<String, Pack> {
    HashMap::from([
        (
            "price_1Sg1IfAD8RQLLuu15Jkwp4UJ".to_string(),
            Pack {
                name: "starter".to_string(),
                credits: 10,
                amount: 499,
            },
        ),
        (
            "price_1Sg1JAAD8RQLLuu1ie8SYSAc".to_string(),
            Pack {
                name: "pro".to_string(),
                credits: 25,
                amount: 999,
            },
        ),
    ])
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CreditsConfig {
    /// Free allotment granted when a profile is created
    pub initial_credits: i32,
}

impl Default for CreditsConfig {
    fn default() -> Self {
        Self { initial_credits: 3 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Maximum generation requests per account per fixed one-hour window.
    /// 0 disables the limiter.
    pub generations_per_hour: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            generations_per_hour: 10,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins. Empty list falls back to a permissive layer.
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

impl Config {
    /// Load configuration from the YAML file and environment overrides.
    pub fn load(args: &Args) -> anyhow::Result<Self> {
        let figment = Figment::new()
            .merge(Yaml::file(&args.config))
            .merge(Env::prefixed("THUMBFORGE_").split("__"));

        let mut config: Config = figment.extract()?;

        // DATABASE_URL is the conventional deployment override
        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database.url = url;
        }

        Ok(config)
    }

    /// Convenience accessor for the Stripe section, if payments are configured.
    pub fn stripe(&self) -> Option<&StripeConfig> {
        match self.payment.as_ref() {
            Some(PaymentConfig::Stripe(stripe)) => Some(stripe),
            None => None,
        }
    }
}
