use axum::{
    Json,
    body::Body,
    extract::State,
    http::{StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use super::{
    error::ApiError,
    models::HealthResponse,
    state::AppState,
    utils::{check_source_size, decode_path, image_content_type, thumbnail_headers},
};
use crate::imaging::SourceImage;
use crate::imaging::encode::encode_derivative;
use crate::imaging::policy::recipe_for;
use crate::streaming::{DualSink, spawn_encoder};
use crate::thumbnail::{self, ThumbnailRequest};

/// Thumbnail endpoint, mounted as the router fallback
///
/// ## Flow:
/// 1. Percent-decode the path and match it against the thumbnail grammar (no match: 404)
/// 2. Stat the source object (missing: 404)
/// 3. Stat the cached derivative; on a hit, stream it back with `X-Resized: false`
/// 4. Otherwise download and decode the source, pick the format recipe and
///    encode once, streaming to the client (`X-Resized: true`) while buffering
///    a copy. The copy is written to the cache after the last byte, and the
///    response body ends once that write has returned
pub async fn serve_thumbnail(State(state): State<AppState>, uri: Uri) -> Response {
    let request_id = Uuid::now_v7().to_string();
    let span = info_span!("thumbnail", %request_id, path = %uri.path());

    async move {
        match respond(&state, uri.path(), &request_id).await {
            Ok(response) => response,
            Err(e) => {
                if e.status_code().is_server_error() {
                    warn!(error = %e, code = e.code(), "Thumbnail request failed");
                } else {
                    debug!(error = %e, code = e.code(), "Thumbnail not served");
                }
                state.metrics.request_failed();
                e.into_response()
            }
        }
    }
    .instrument(span)
    .await
}

async fn respond(state: &AppState, raw_path: &str, request_id: &str) -> Result<Response, ApiError> {
    let path = decode_path(raw_path)?;
    let request = thumbnail::resolve(&path).ok_or_else(|| ApiError::NotFound(path.clone()))?;

    let source_key = request.source_key();
    let source_size = state
        .storage
        .stat(&source_key)
        .await?
        .ok_or_else(|| ApiError::NotFound(source_key.clone()))?;

    let cache_key = request.cache_key();
    if state.storage.exists(&cache_key).await? {
        return serve_cached(state, &cache_key, request_id).await;
    }

    state.metrics.cache_miss();
    check_source_size(
        source_size,
        state.config.imaging.max_source_bytes.as_u64(),
    )?;
    serve_fresh(state, &request, &source_key, cache_key, request_id).await
}

async fn serve_cached(
    state: &AppState,
    cache_key: &str,
    request_id: &str,
) -> Result<Response, ApiError> {
    let cached = state.storage.fetch_target(cache_key).await?;
    state.metrics.cache_hit();
    info!(key = cache_key, size = cached.size, "Serving cached derivative");

    let mut headers = thumbnail_headers(&cached.content_type, false, &state.serve_from, request_id);
    headers.insert(header::CONTENT_LENGTH, cached.size.into());

    Ok((StatusCode::OK, headers, Body::from_stream(cached.stream)).into_response())
}

async fn serve_fresh(
    state: &AppState,
    request: &ThumbnailRequest,
    source_key: &str,
    cache_key: String,
    request_id: &str,
) -> Result<Response, ApiError> {
    let source = state.storage.fetch_source(source_key).await?;
    let source_content_type = source.content_type;
    let bytes = source.bytes;

    let decoded = tokio::task::spawn_blocking(move || SourceImage::decode(&bytes))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    let recipe = recipe_for(decoded.format);
    let content_type = recipe.resolve_content_type(
        image_content_type(source_content_type.as_deref()),
        decoded.format,
    );
    let (source_width, source_height) = decoded.dimensions();
    info!(
        key = source_key,
        format = ?decoded.format,
        source_width,
        source_height,
        width = request.target_width,
        height = request.target_height,
        "Resizing source"
    );

    let imaging = &state.config.imaging;
    let (width, height) = (request.target_width, request.target_height);
    let frame_queue_depth = imaging.frame_queue_depth;
    let (chunks, encoder) = spawn_encoder(
        imaging.pipe_capacity,
        imaging.chunk_size.as_usize(),
        move |writer| encode_derivative(&decoded, &recipe, width, height, frame_queue_depth, writer),
    );

    let storage = state.storage.clone();
    let metrics = state.metrics.clone();
    let cache_content_type = content_type.clone();
    let cache_write = move |bytes: Bytes| async move {
        if let Err(e) = storage.put_target(&cache_key, bytes, &cache_content_type).await {
            warn!(key = %cache_key, error = %e, "Cache write failed");
            metrics.cache_write_failed();
        }
    };

    let body = DualSink::new(imaging.pipe_capacity, state.config.server.stall_timeout())
        .fork(chunks, encoder, cache_write)
        .await?;
    state.metrics.resized();

    let headers = thumbnail_headers(&content_type, true, &state.serve_from, request_id);
    Ok((StatusCode::OK, headers, body).into_response())
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        metrics: state.metrics.snapshot(),
    })
}
