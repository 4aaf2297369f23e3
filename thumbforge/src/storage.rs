//! Artifact object storage.
//!
//! Generated artifacts are persisted to an S3-compatible bucket and served
//! from a public base URL. The [`ArtifactStore`] trait is the seam the
//! reservation flow depends on, so tests can substitute in-memory and
//! failing implementations.

use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::primitives::ByteStream;
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::types::UserId;

/// Storage seam for generated artifacts.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Persist one artifact under `key`, returning its public URL.
    async fn put(&self, key: &str, content_type: &str, bytes: Vec<u8>) -> anyhow::Result<String>;

    /// Delete the object behind a previously returned public URL.
    async fn delete(&self, url: &str) -> anyhow::Result<()>;
}

/// Object key for one artifact in a generation batch.
pub fn artifact_key(user_id: UserId, index: usize, mime_type: &str) -> String {
    let extension = match mime_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        _ => "png",
    };
    format!("{user_id}/generation-{}-{index}.{extension}", Uuid::new_v4())
}

/// Join a public base URL and an object key.
pub fn build_public_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key)
}

/// S3-backed artifact store.
pub struct S3ArtifactStore {
    client: S3Client,
    bucket: String,
    public_base_url: String,
}

impl S3ArtifactStore {
    /// Build the store from configuration, honoring custom S3-compatible
    /// endpoints (e.g., MinIO) with path-style addressing.
    pub async fn from_config(config: &StorageConfig) -> Self {
        let region_provider = RegionProviderChain::default_provider().or_else("us-east-1");
        let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(region_provider)
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&aws_config);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            client: S3Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
            public_base_url: config.public_base(),
        }
    }

    /// Recover the object key from a public URL. Returns None for URLs that
    /// were not produced by this store.
    fn key_from_url(&self, url: &str) -> Option<String> {
        let base = format!("{}/", self.public_base_url.trim_end_matches('/'));
        let key = url.strip_prefix(&base)?;
        // Drop any query parameters appended by CDNs
        let key = key.split('?').next().unwrap_or(key);
        (!key.is_empty()).then(|| key.to_string())
    }
}

#[async_trait]
impl ArtifactStore for S3ArtifactStore {
    async fn put(&self, key: &str, content_type: &str, bytes: Vec<u8>) -> anyhow::Result<String> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .cache_control("max-age=3600")
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to upload artifact {key}: {e}"))?;

        Ok(build_public_url(&self.public_base_url, key))
    }

    async fn delete(&self, url: &str) -> anyhow::Result<()> {
        let Some(key) = self.key_from_url(url) else {
            // Foreign URL: nothing of ours to delete
            tracing::warn!("Refusing to delete artifact outside the public base URL: {url}");
            return Ok(());
        };

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to delete artifact {key}: {e}"))?;

        Ok(())
    }
}
