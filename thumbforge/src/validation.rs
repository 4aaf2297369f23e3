//! Generation request validation.
//!
//! Pure functions: checking a request has no side effects. Validation runs
//! before any external call is made, so a rejected request costs nothing.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::api::models::generate::GenerateRequest;
use crate::errors::{Error, Result};

pub const MIN_PROMPT_CHARS: usize = 10;
pub const MAX_PROMPT_CHARS: usize = 2000;
pub const MIN_COUNT: i32 = 1;
pub const MAX_COUNT: i32 = 4;
pub const DEFAULT_COUNT: i32 = 2;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));

/// A request that passed validation: sanitized prompt, resolved count,
/// and the image payloads in generation order.
#[derive(Debug, Clone)]
pub struct ValidatedGeneration {
    pub face_image: String,
    pub inspiration_image: String,
    pub extra_image: Option<String>,
    pub prompt: String,
    pub count: i32,
}

/// Sanitize a prompt: strip HTML-like tags, trim, truncate to
/// [`MAX_PROMPT_CHARS`] characters.
///
/// Idempotent: `sanitize_prompt(&sanitize_prompt(x)) == sanitize_prompt(x)`.
pub fn sanitize_prompt(raw: &str) -> String {
    let stripped = TAG_RE.replace_all(raw, "");
    let trimmed = stripped.trim();
    let truncated: String = trimmed.chars().take(MAX_PROMPT_CHARS).collect();
    truncated.trim_end().to_string()
}

/// Validate a generation request, returning the sanitized inputs.
///
/// Rejections, in check order:
/// - missing face or inspiration image (the extra image is optional)
/// - sanitized prompt shorter than [`MIN_PROMPT_CHARS`]
/// - requested count outside `[MIN_COUNT, MAX_COUNT]` (defaults to
///   [`DEFAULT_COUNT`] when unspecified)
pub fn validate_generate(request: &GenerateRequest) -> Result<ValidatedGeneration> {
    let face_image = non_empty(request.face_image_url.as_deref()).ok_or_else(|| Error::Validation {
        message: "Face image is required".to_string(),
    })?;

    let inspiration_image = non_empty(request.inspiration_image_url.as_deref()).ok_or_else(|| Error::Validation {
        message: "Inspiration image is required".to_string(),
    })?;

    let extra_image = non_empty(request.extra_image_url.as_deref());

    let prompt = sanitize_prompt(request.prompt.as_deref().unwrap_or_default());
    if prompt.chars().count() < MIN_PROMPT_CHARS {
        return Err(Error::Validation {
            message: format!("Prompt must contain at least {MIN_PROMPT_CHARS} characters"),
        });
    }

    let count = request.count.unwrap_or(DEFAULT_COUNT);
    if !(MIN_COUNT..=MAX_COUNT).contains(&count) {
        return Err(Error::Validation {
            message: format!("Image count must be between {MIN_COUNT} and {MAX_COUNT}"),
        });
    }

    Ok(ValidatedGeneration {
        face_image,
        inspiration_image,
        extra_image,
        prompt,
        count,
    })
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(prompt: &str, count: Option<i32>) -> GenerateRequest {
        GenerateRequest {
            face_image_url: Some("data:image/png;base64,Zm9v".to_string()),
            inspiration_image_url: Some("data:image/png;base64,YmFy".to_string()),
            extra_image_url: None,
            prompt: Some(prompt.to_string()),
            count,
        }
    }

    #[test]
    fn test_sanitize_strips_tags() {
        assert_eq!(sanitize_prompt("hello <b>world</b>"), "hello world");
        assert_eq!(sanitize_prompt("<script>alert(1)</script>safe text"), "alert(1)safe text");
    }

    #[test]
    fn test_sanitize_truncates_to_max_chars() {
        let long = "x".repeat(MAX_PROMPT_CHARS + 50);
        assert_eq!(sanitize_prompt(&long).chars().count(), MAX_PROMPT_CHARS);
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let long = format!("{}   ", "y".repeat(MAX_PROMPT_CHARS + 10));
        let inputs = [
            "  padded prompt with <em>markup</em>  ",
            "plain prompt of reasonable length",
            long.as_str(),
        ];
        for input in inputs {
            let once = sanitize_prompt(input);
            assert_eq!(sanitize_prompt(&once), once, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn test_prompt_boundary_ten_chars_passes_nine_fails() {
        assert!(validate_generate(&request("exactly10!", None)).is_ok());
        assert!(validate_generate(&request("nine char", None)).is_err());
    }

    #[test]
    fn test_prompt_length_checked_after_sanitization() {
        // 12 raw characters, but only 9 survive tag stripping
        let result = validate_generate(&request("<b>nine char", None));
        assert!(result.is_err());
    }

    #[test]
    fn test_count_bounds() {
        assert!(validate_generate(&request("a valid prompt", Some(1))).is_ok());
        assert!(validate_generate(&request("a valid prompt", Some(4))).is_ok());
        assert!(validate_generate(&request("a valid prompt", Some(0))).is_err());
        assert!(validate_generate(&request("a valid prompt", Some(5))).is_err());
    }

    #[test]
    fn test_count_defaults_to_two() {
        let validated = validate_generate(&request("a valid prompt", None)).unwrap();
        assert_eq!(validated.count, DEFAULT_COUNT);
    }

    #[test]
    fn test_missing_images_rejected() {
        let mut missing_face = request("a valid prompt", None);
        missing_face.face_image_url = None;
        assert!(validate_generate(&missing_face).is_err());

        let mut missing_inspiration = request("a valid prompt", None);
        missing_inspiration.inspiration_image_url = Some("   ".to_string());
        assert!(validate_generate(&missing_inspiration).is_err());

        // The extra image is optional
        let mut with_extra = request("a valid prompt", None);
        with_extra.extra_image_url = Some("data:image/png;base64,YmF6".to_string());
        assert!(validate_generate(&with_extra).is_ok());
    }
}
