use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use fresnel_api::error::{BackendError, ErrorKind};
use fresnel_api::store::DocumentStore;
use fresnel_engine::intercept::Interceptor;

pub mod mirror;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub interceptor: Arc<Interceptor>,
}

/// Generic CRUD HTTP server over the primary store. Every collection
/// gets the same surface; the mirror middleware observes finalized
/// write responses for the mirrored ones.
pub async fn run(port: u16, state: AppState, shutdown: CancellationToken) -> Result<(), String> {
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .map_err(|e| format!("bind api :{port}: {e}"))?;
    serve(listener, state, shutdown).await
}

/// Serve on an already-bound listener (tests bind port 0).
pub async fn serve(
    listener: tokio::net::TcpListener,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<(), String> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| format!("axum serve: {e}"))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/{collection}", get(handle_list).post(handle_create))
        .route(
            "/{collection}/{id}",
            get(handle_get).put(handle_replace).delete(handle_delete),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            mirror::observe,
        ))
        .with_state(state)
}

// --- REST: GET /{collection} ---

async fn handle_list(
    State(state): State<AppState>,
    Path(collection): Path<String>,
) -> Response {
    match state.store.list(&collection).await {
        Ok(records) => Json(records).into_response(),
        Err(e) => error_response(e),
    }
}

// --- REST: GET /{collection}/{id} ---

async fn handle_get(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> Response {
    match state.store.get(&collection, &id).await {
        Ok(record) => Json(record).into_response(),
        Err(e) => error_response(e),
    }
}

// --- REST: POST /{collection} ---

async fn handle_create(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let Value::Object(fields) = body else {
        return error_response(BackendError::format("request body must be a JSON object"));
    };
    match state.store.create(&collection, fields).await {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(e) => error_response(e),
    }
}

// --- REST: PUT /{collection}/{id} ---

async fn handle_replace(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Response {
    let Value::Object(fields) = body else {
        return error_response(BackendError::format("request body must be a JSON object"));
    };
    match state.store.replace(&collection, &id, fields).await {
        Ok(record) => Json(record).into_response(),
        Err(e) => error_response(e),
    }
}

// --- REST: DELETE /{collection}/{id} ---

async fn handle_delete(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> Response {
    match state.store.delete(&collection, &id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

fn error_response(e: BackendError) -> Response {
    let status = match e.kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Format => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(serde_json::json!({ "error": e.message }))).into_response()
}
