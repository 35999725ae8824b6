//! Idempotency-key replay protection for mutating routes.
//!
//! A client that retries `POST /orders` after a timeout must not create a
//! second order for the same cart. Requests carrying an `Idempotency-Key`
//! header get their response cached for a short window; a retry with the
//! same key replays the stored response instead of re-executing, and a
//! duplicate arriving while the first is still in flight is rejected with
//! 409. Redis backs the cache; when it is unreachable a bounded in-process
//! store keeps the guarantee on a single node.

use axum::{
    extract::Request,
    http::{HeaderName, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use http_body_util::BodyExt as _;
use lazy_static::lazy_static;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::warn;

const REPLAY_KEY_HEADER: &str = "idempotency-key";
const REPLAY_TTL_SECS: usize = 600; // 10 minutes
const LOCAL_STORE_CAP: usize = 1024;
const MAX_REPLAYABLE_BODY_BYTES: usize = 256 * 1024;

lazy_static! {
    static ref LOCAL_STORE: Mutex<LocalStore> = Mutex::new(LocalStore::default());
}

/// A response snapshot small enough to replay later.
#[derive(Clone, Serialize, Deserialize)]
struct ReplayableResponse {
    status: u16,
    content_type: Option<String>,
    body: String,
}

impl ReplayableResponse {
    fn into_response(self) -> Response {
        let mut resp = Response::new(axum::body::Body::from(self.body));
        *resp.status_mut() = StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK);
        if let Some(ct) = self.content_type.and_then(|s| s.parse().ok()) {
            resp.headers_mut()
                .insert(HeaderName::from_static("content-type"), ct);
        }
        resp
    }
}

#[derive(Default)]
struct LocalStore {
    entries: HashMap<String, (Instant, ReplayableResponse)>,
}

impl LocalStore {
    fn prune(&mut self) {
        let ttl = Duration::from_secs(REPLAY_TTL_SECS as u64);
        self.entries
            .retain(|_, (inserted_at, _)| inserted_at.elapsed() <= ttl);

        while self.entries.len() > LOCAL_STORE_CAP {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, (inserted_at, _))| *inserted_at)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }

    fn get(&mut self, key: &str) -> Option<ReplayableResponse> {
        self.prune();
        self.entries.get(key).map(|(_, stored)| stored.clone())
    }

    fn insert(&mut self, key: String, stored: ReplayableResponse) {
        self.entries.insert(key, (Instant::now(), stored));
        self.prune();
    }
}

/// Buffers a response body and returns the rebuilt response together with a
/// snapshot for the replay cache. The snapshot is `None` when the body is
/// too large to cache or could not be buffered.
async fn snapshot_response(resp: Response) -> (Response, Option<ReplayableResponse>) {
    let (parts, body) = resp.into_parts();
    match body.collect().await {
        Ok(collected) => {
            let bytes = collected.to_bytes();
            if bytes.len() > MAX_REPLAYABLE_BODY_BYTES {
                warn!(
                    "response of {} bytes exceeds the replay cache limit, skipping",
                    bytes.len()
                );
                return (Response::from_parts(parts, axum::body::Body::from(bytes)), None);
            }
            let snapshot = ReplayableResponse {
                status: parts.status.as_u16(),
                content_type: parts
                    .headers
                    .get("content-type")
                    .and_then(|v| v.to_str().ok())
                    .map(|s| s.to_string()),
                body: String::from_utf8_lossy(&bytes).to_string(),
            };
            (
                Response::from_parts(parts, axum::body::Body::from(bytes)),
                Some(snapshot),
            )
        }
        Err(e) => {
            warn!("could not buffer response body for the replay cache: {}", e);
            (Response::from_parts(parts, axum::body::Body::empty()), None)
        }
    }
}

pub async fn idempotency_middleware(
    axum::extract::State(redis_client): axum::extract::State<Arc<redis::Client>>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().clone();
    if !matches!(method.as_str(), "POST" | "PUT" | "PATCH" | "DELETE") {
        return next.run(req).await;
    }

    let Some(key) = req
        .headers()
        .get(REPLAY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
    else {
        return next.run(req).await;
    };

    let cache_key = format!("replay:{}:{}:{}", method, req.uri().path(), key);
    let lock_key = format!("{}:in-flight", cache_key);

    let mut conn = match redis_client.get_async_connection().await {
        Ok(c) => c,
        Err(e) => {
            warn!("replay cache unreachable, using in-process store: {}", e);
            return run_with_local_store(cache_key, req, next).await;
        }
    };

    if let Some(stored) = fetch_snapshot(&mut conn, &cache_key).await {
        return stored.into_response();
    }

    // Claim the key for this request. Losing the claim means an identical
    // request is either finished (replay it) or still running (409).
    match conn.set_nx::<_, _, bool>(&lock_key, "1").await {
        Ok(true) => {
            let _: Result<(), _> = conn.expire(&lock_key, REPLAY_TTL_SECS).await;
        }
        Ok(false) => {
            if let Some(stored) = fetch_snapshot(&mut conn, &cache_key).await {
                return stored.into_response();
            }
            return (
                StatusCode::CONFLICT,
                "A request with this idempotency key is still being processed",
            )
                .into_response();
        }
        Err(e) => {
            warn!("could not claim idempotency key, passing request through: {}", e);
            return next.run(req).await;
        }
    }

    // The snapshot must land before the claim is released; a concurrent
    // retry either replays it or keeps getting 409, never a second run.
    let (response, snapshot) = snapshot_response(next.run(req).await).await;
    if let Some(snapshot) = snapshot {
        if let Ok(json) = serde_json::to_string(&snapshot) {
            let _: Result<(), _> = conn.set_ex(&cache_key, json, REPLAY_TTL_SECS).await;
        }
    }
    let _: Result<(), _> = conn.del(&lock_key).await;
    response
}

async fn fetch_snapshot(
    conn: &mut redis::aio::Connection,
    cache_key: &str,
) -> Option<ReplayableResponse> {
    let json: Option<String> = conn.get(cache_key).await.ok().flatten();
    json.and_then(|json| serde_json::from_str(&json).ok())
}

async fn run_with_local_store(cache_key: String, req: Request, next: Next) -> Response {
    if let Some(stored) = {
        let mut store = LOCAL_STORE.lock().await;
        store.get(&cache_key)
    } {
        return stored.into_response();
    }

    let (response, snapshot) = snapshot_response(next.run(req).await).await;
    if let Some(snapshot) = snapshot {
        let mut store = LOCAL_STORE.lock().await;
        store.insert(cache_key, snapshot);
    }
    response
}
