//! Client for the hosted image generation API.
//!
//! The provider exposes a `generateContent` REST endpoint that accepts a
//! text part plus inline base64 image parts and returns inline image data.
//! Artifacts are produced one request at a time, in order - there is no
//! fan-out within a generation batch, so provider latency dominates the
//! whole request.

use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};

use crate::config::AiConfig;
use crate::errors::{Error, Result};
use crate::validation::ValidatedGeneration;

/// Fixed framing prepended to every user prompt.
const PROMPT_PREAMBLE: &str = "Create YouTube thumbnail 16:9. Include face, style reference, and object.";

/// An inline image payload: mime type plus base64 data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

/// Split a data-URL into mime type and base64 payload.
///
/// Raw base64 without the `data:` prefix is accepted as a fallback and
/// assumed to be JPEG.
pub fn parse_data_url(value: &str) -> InlineData {
    if let Some(rest) = value.strip_prefix("data:") {
        if let Some((mime, data)) = rest.split_once(";base64,") {
            return InlineData {
                mime_type: mime.to_string(),
                data: data.to_string(),
            };
        }
    }

    InlineData {
        mime_type: "image/jpeg".to_string(),
        data: value.to_string(),
    }
}

/// Render an inline payload back into a data-URL.
pub fn to_data_url(mime_type: &str, data: &str) -> String {
    format!("data:{mime_type};base64,{data}")
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

/// Thin client over the provider's REST surface.
///
/// The base URL is injectable so tests can point at a mock server.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(config: &AiConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    /// Generate `count` artifacts for the validated request, one provider
    /// call per artifact. Returns one data-URL per artifact, in order.
    ///
    /// Any provider failure aborts the whole batch; partial batches are
    /// never returned.
    pub async fn generate(&self, request: &ValidatedGeneration) -> Result<Vec<String>> {
        let mut parts = vec![Part {
            text: Some(format!("{PROMPT_PREAMBLE} {}", request.prompt)),
            inline_data: None,
        }];

        for image in [Some(&request.face_image), Some(&request.inspiration_image), request.extra_image.as_ref()]
            .into_iter()
            .flatten()
        {
            parts.push(Part {
                text: None,
                inline_data: Some(parse_data_url(image)),
            });
        }

        let body = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            generation_config: GenerationConfig {
                response_modalities: vec!["IMAGE".to_string(), "TEXT".to_string()],
            },
        };

        let mut artifacts = Vec::with_capacity(request.count as usize);
        for _ in 0..request.count {
            artifacts.push(self.generate_one(&body).await?);
        }

        Ok(artifacts)
    }

    async fn generate_one(&self, body: &GenerateContentRequest) -> Result<String> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header(CONTENT_TYPE, "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Provider {
                message: format!("Request to generation provider failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::Provider {
                message: format!("Generation provider returned {status}: {detail}"),
            });
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(|e| Error::Provider {
            message: format!("Generation provider returned an unreadable response: {e}"),
        })?;

        parsed
            .candidates
            .into_iter()
            .filter_map(|candidate| candidate.content)
            .flat_map(|content| content.parts)
            .find_map(|part| {
                part.inline_data
                    .map(|inline| to_data_url(&inline.mime_type, &inline.data))
            })
            .ok_or_else(|| Error::Provider {
                message: "Generation provider returned no image data".to_string(),
            })
    }
}
