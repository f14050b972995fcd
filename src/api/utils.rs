//! API utility functions
//!
//! Pure helpers for request processing, kept apart from services.rs so they
//! can be unit tested.

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use percent_encoding::percent_decode_str;

use crate::api::error::ApiError;

/// Percent-decodes a request path before it is matched against the grammar
///
/// Invalid UTF-8 after decoding cannot name an object key and is treated as not found.
pub fn decode_path(raw: &str) -> Result<String, ApiError> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| ApiError::NotFound(raw.to_string()))
}

/// Returns the store-recorded content type only when it names an image type
pub fn image_content_type(recorded: Option<&str>) -> Option<&str> {
    let recorded = recorded?;
    let parsed: mime::Mime = recorded.parse().ok()?;
    (parsed.type_() == mime::IMAGE).then_some(recorded)
}

/// Rejects sources larger than the configured limit before they are downloaded
pub fn check_source_size(size: u64, limit: u64) -> Result<(), ApiError> {
    if size > limit {
        return Err(ApiError::SourceTooLarge { size, limit });
    }
    Ok(())
}

/// Headers shared by cached and fresh thumbnail responses
pub fn thumbnail_headers(
    content_type: &str,
    resized: bool,
    serve_from: &str,
    request_id: &str,
) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let values = [
        ("content-type", content_type),
        (super::models::X_RESIZED, if resized { "true" } else { "false" }),
        (super::models::X_SERVE_FROM, serve_from),
        (super::models::X_REQUEST_ID, request_id),
    ];
    for (name, value) in values {
        // Skip values that cannot travel as a header rather than failing the response
        if let Ok(value) = HeaderValue::from_str(value) {
            headers.insert(HeaderName::from_static(name), value);
        }
    }
    headers
}
