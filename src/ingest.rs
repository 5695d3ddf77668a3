//! Edge deployment API: webhook ingest and status read over a key-value store.
//!
//! A producer (see the `push` subcommand) POSTs the whole dashboard payload to
//! `/api/webhook`. The payload is stamped with `receivedAt`/`source`, stored
//! under `latest`, and also kept as a `history:<ms>` snapshot for seven days.
//! `/api/status` hands back whatever `latest` holds.
//!
//! When no webhook secret is configured the write path accepts anyone. That is
//! convenient for a private deployment and unsafe for a public one.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::error::IngestError;
use crate::kv::KvStore;
use crate::models::Payload;

/// Key holding the most recent payload. Never expires.
pub const LATEST_KEY: &str = "latest";

/// Prefix of per-receipt snapshot keys.
pub const HISTORY_PREFIX: &str = "history:";

/// Lifetime of a history snapshot.
pub const HISTORY_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Two pushes in the same millisecond share a key; the later one wins.
pub fn history_key(received_ms: i64) -> String {
    format!("{}{}", HISTORY_PREFIX, received_ms)
}

#[derive(Clone, Default)]
pub struct IngestState {
    /// `None` when no store is bound: reads degrade to a default payload and
    /// writes fail.
    pub store: Option<Arc<dyn KvStore>>,
    pub webhook_secret: Option<String>,
}

impl IngestState {
    pub fn new(store: Option<Arc<dyn KvStore>>, webhook_secret: Option<String>) -> Self {
        Self {
            store,
            webhook_secret: webhook_secret.filter(|s| !s.is_empty()),
        }
    }
}

pub fn router(state: IngestState) -> Router {
    let status_routes = get(status_handler)
        .options(preflight)
        .fallback(status_handler)
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("public, max-age=30"),
        ));

    Router::new()
        .route("/api/status", status_routes)
        .route(
            "/api/webhook",
            post(webhook_handler)
                .options(preflight)
                .fallback(usage_handler),
        )
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, POST, OPTIONS"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn iso_now() -> String {
    iso(Utc::now())
}

fn iso(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

async fn preflight() -> StatusCode {
    StatusCode::OK
}

// -----------------------------------------------------------------------------
// Status read
// -----------------------------------------------------------------------------

/// Served while nothing has been pushed yet.
fn default_status() -> Value {
    json!({
        "status": "online",
        "message": "Dashboard API ready",
        "timestamp": iso_now(),
        "note": "No data exported yet. Run `openclaw-dashboard push` or wait for cron.",
    })
}

/// The stored `latest` payload, if any.
pub async fn read_latest(state: &IngestState) -> Result<Option<Value>, IngestError> {
    let Some(store) = &state.store else {
        return Ok(None);
    };
    let Some(raw) = store.get(LATEST_KEY).await? else {
        return Ok(None);
    };

    let value: Value = serde_json::from_str(&raw)
        .map_err(|e| IngestError::Parse(format!("stored payload is not JSON: {}", e)))?;
    Ok(Some(value).filter(|v| !v.is_null()))
}

fn pretty_json(status: StatusCode, value: &Value) -> Response {
    let body = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}

async fn status_handler(State(state): State<IngestState>) -> Response {
    match read_latest(&state).await {
        Ok(Some(latest)) => pretty_json(StatusCode::OK, &latest),
        Ok(None) => pretty_json(StatusCode::OK, &default_status()),
        Err(e) => {
            error!("Failed to read latest payload: {}", e);
            pretty_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                &json!({
                    "status": "error",
                    "message": e.to_string(),
                    "timestamp": iso_now(),
                }),
            )
        }
    }
}

// -----------------------------------------------------------------------------
// Webhook write
// -----------------------------------------------------------------------------

/// Check `Authorization: Bearer <secret>` when a secret is configured.
pub fn authorize(secret: Option<&str>, headers: &HeaderMap) -> Result<(), IngestError> {
    let Some(secret) = secret else {
        return Ok(());
    };

    let provided = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    if provided == Some(format!("Bearer {}", secret).as_str()) {
        Ok(())
    } else {
        Err(IngestError::Unauthorized)
    }
}

/// Stamp a pushed document with receipt metadata.
///
/// Objects keep their fields. Strings and arrays spread into index-keyed
/// fields, and other scalars contribute nothing. Producer-supplied
/// `receivedAt`/`source` fields are overwritten.
pub fn enrich(data: Value, received_at: &str) -> Payload {
    let mut fields = match data {
        Value::Object(fields) => fields,
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| (i.to_string(), item))
            .collect(),
        Value::String(text) => text
            .chars()
            .enumerate()
            .map(|(i, c)| (i.to_string(), Value::from(c.to_string())))
            .collect(),
        Value::Null | Value::Bool(_) | Value::Number(_) => Map::new(),
    };
    fields.insert("receivedAt".to_string(), Value::from(received_at));
    fields.insert("source".to_string(), Value::from("webhook"));
    Payload::Opaque(Value::Object(fields))
}

/// Authorize, parse and store one push. Returns the `receivedAt` stamp.
pub async fn receive(
    state: &IngestState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<String, IngestError> {
    authorize(state.webhook_secret.as_deref(), headers)?;

    let data: Value =
        serde_json::from_slice(body).map_err(|e| IngestError::Parse(e.to_string()))?;

    let now = Utc::now();
    let received_at = iso(now);
    let payload = enrich(data, &received_at);

    let store = state.store.as_ref().ok_or(IngestError::StoreUnavailable)?;
    let serialized = payload.to_value().to_string();
    store.put(LATEST_KEY, &serialized, None).await?;
    store
        .put(
            &history_key(now.timestamp_millis()),
            &serialized,
            Some(HISTORY_TTL),
        )
        .await?;

    info!("Stored webhook payload ({} bytes)", serialized.len());
    Ok(received_at)
}

async fn webhook_handler(
    State(state): State<IngestState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match receive(&state, &headers, &body).await {
        Ok(received_at) => Json(json!({
            "success": true,
            "message": "Data received",
            "timestamp": received_at,
        }))
        .into_response(),
        Err(IngestError::Unauthorized) => {
            warn!("Rejected webhook push with bad credentials");
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Unauthorized" })),
            )
                .into_response()
        }
        Err(e) => {
            error!("Webhook push failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn usage_handler() -> Json<Value> {
    Json(json!({
        "endpoint": "/api/webhook",
        "method": "POST",
        "description": "Send dashboard data updates",
        "example": {
            "projects": [],
            "sessions": [],
            "status": "active",
        },
    }))
}
