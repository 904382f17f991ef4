//! Request validation performed before any network call.

use platecast_models::GenerationKind;
use url::Url;

use crate::error::{ProviderError, ProviderResult};

/// Provider's own asset reference scheme.
pub const PROVIDER_REFERENCE_SCHEME: &str = "runway://";

/// Maximum prompt length accepted by the provider.
pub const MAX_PROMPT_CHARS: usize = 1000;

/// Clip durations the provider supports.
pub const SUPPORTED_DURATIONS: [u32; 2] = [5, 10];

/// Check and normalize a source image reference for image-to-video.
///
/// Accepted: absolute `https://` URLs, `data:image/...` URIs and provider
/// references. `http://` is upgraded to `https://`. Local paths, `file://`,
/// bare base64 and other schemes are rejected.
pub fn validate_source_image(raw: &str) -> ProviderResult<String> {
    let candidate = raw.trim();
    if candidate.is_empty() {
        return Err(ProviderError::validation("source image URL is empty"));
    }

    if candidate.starts_with("data:image/") || candidate.starts_with(PROVIDER_REFERENCE_SCHEME) {
        return Ok(candidate.to_string());
    }

    let mut url = Url::parse(candidate).map_err(|_| {
        ProviderError::validation("source image must be an absolute https URL, data:image URI or provider reference")
    })?;

    match url.scheme() {
        "https" => {}
        "http" => {
            url.set_scheme("https")
                .map_err(|_| ProviderError::validation("cannot upgrade http URL to https"))?;
        }
        other => {
            return Err(ProviderError::validation(format!(
                "unsupported source image scheme: {other}"
            )))
        }
    }

    if url.host_str().is_none() {
        return Err(ProviderError::validation("source image URL has no host"));
    }

    Ok(url.to_string())
}

/// Prompts must be non-empty and within the provider limit.
pub fn validate_prompt(prompt: &str) -> ProviderResult<()> {
    if prompt.trim().is_empty() {
        return Err(ProviderError::validation("prompt is empty"));
    }
    let len = prompt.chars().count();
    if len > MAX_PROMPT_CHARS {
        return Err(ProviderError::validation(format!(
            "prompt is {len} characters, limit is {MAX_PROMPT_CHARS}"
        )));
    }
    Ok(())
}

/// Video clips must use a supported duration. Images ignore it.
pub fn validate_duration(kind: GenerationKind, seconds: u32) -> ProviderResult<()> {
    if kind == GenerationKind::ImageToVideo && !SUPPORTED_DURATIONS.contains(&seconds) {
        return Err(ProviderError::validation(format!(
            "unsupported clip duration {seconds}s, expected 5 or 10"
        )));
    }
    Ok(())
}
