//! Response bodies and headers of the HTTP surface.
//!
//! Successful thumbnail responses are raw image bytes; only errors and
//! `/health` carry JSON.

use serde::Serialize;

use crate::observability::MetricsSnapshot;

/// `true` when the derivative was computed for this request, `false` on a cache hit
pub const X_RESIZED: &str = "x-resized";
/// Host identity of the serving node
pub const X_SERVE_FROM: &str = "x-serve-from";
/// Per-request correlation id, also recorded on the request span
pub const X_REQUEST_ID: &str = "x-request-id";

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub metrics: MetricsSnapshot,
}
