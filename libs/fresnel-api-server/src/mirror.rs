use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::AppState;

/// Response-observation middleware.
///
/// Runs around the CRUD handlers: by the time it sees the response, the
/// primary-store write is finalized and the response is fully built. For
/// 2xx writes on mirrored collections the outgoing body is buffered,
/// handed to the interceptor, and the response reconstructed
/// byte-identical. The interceptor only enqueues — no index I/O happens
/// on the request path, so the client is never delayed by propagation.
pub async fn observe(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    // A failed primary write produces nothing to propagate.
    if !response.status().is_success() {
        return response;
    }
    let Some((collection, id)) = split_path(&path) else {
        return response;
    };
    if !state.interceptor.is_mirrored(collection) {
        return response;
    }

    if method == Method::POST && id.is_none() {
        observe_body(&state, collection, response, false).await
    } else if method == Method::PUT && id.is_some() {
        observe_body(&state, collection, response, true).await
    } else if method == Method::DELETE
        && let Some(id) = id
    {
        // The primary delete has already completed; only now is the
        // index delete dispatched.
        state.interceptor.observe_delete(collection, id);
        response
    } else {
        response
    }
}

/// Buffer the finalized response body, hand it to the interceptor,
/// rebuild the response from the same bytes.
async fn observe_body(
    state: &AppState,
    collection: &str,
    response: Response,
    is_update: bool,
) -> Response {
    let (parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(error = %e, "failed to buffer write response body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if is_update {
        state.interceptor.observe_update(collection, &bytes);
    } else {
        state.interceptor.observe_create(collection, &bytes);
    }

    Response::from_parts(parts, Body::from(bytes))
}

/// `/blogs` → ("blogs", None); `/blogs/1` → ("blogs", Some("1")).
/// Deeper paths are not CRUD routes.
fn split_path(path: &str) -> Option<(&str, Option<&str>)> {
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    let collection = segments.next()?;
    let id = segments.next();
    match segments.next() {
        Some(_) => None,
        None => Some((collection, id)),
    }
}
