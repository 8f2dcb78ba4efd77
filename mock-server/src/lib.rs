//! In-memory stand-in for the ApiAxle management API.
//!
//! Serves the `/v1` routes the client uses with ApiAxle's envelope:
//! `{"meta": {...}, "results": ...}` on success and
//! `{"meta": {...}, "results": {"error": {"type", "message"}}}` on failure.
//! Proxy traffic is not simulated; stats and charts are computed from hits
//! seeded through `seeded`.

pub mod hits;
pub mod model;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};

pub use hits::{Hit, HitType};
pub use model::{Api, Key, KeyRing, Stored};

use hits::{ChartParams, StatsParams};

#[derive(Debug, Default)]
pub struct Store {
    pub apis: BTreeMap<String, Api>,
    pub keys: BTreeMap<String, Key>,
    pub keyrings: BTreeMap<String, KeyRing>,
    pub hits: Vec<Hit>,
}

pub type Db = Arc<RwLock<Store>>;

/// A store that starts out with recorded `hits`.
pub fn seeded(hits: Vec<Hit>) -> Db {
    Arc::new(RwLock::new(Store {
        hits,
        ..Store::default()
    }))
}

pub fn app() -> Router {
    router(Db::default())
}

pub fn router(db: Db) -> Router {
    Router::new()
        .route("/v1/info", get(server_info))
        .route("/v1/ping", get(ping))
        .route(
            "/v1/api/{id}",
            get(fetch::<Api>).post(create::<Api>).put(update::<Api>).delete(remove::<Api>),
        )
        .route("/v1/api/{id}/linkkey/{key}", put(api_link_key))
        .route("/v1/api/{id}/unlinkkey/{key}", put(api_unlink_key))
        .route("/v1/api/{id}/keys", get(api_keys))
        .route("/v1/api/{id}/stats", get(api_stats))
        .route("/v1/api/{id}/keycharts", get(api_key_charts))
        .route("/v1/apis", get(list::<Api>))
        .route("/v1/apis/charts", get(apis_charts))
        .route(
            "/v1/key/{id}",
            get(fetch::<Key>).post(create::<Key>).put(update::<Key>).delete(remove::<Key>),
        )
        .route("/v1/key/{id}/apis", get(key_apis))
        .route("/v1/key/{id}/stats", get(key_stats))
        .route("/v1/key/{id}/apicharts", get(key_api_charts))
        .route("/v1/keys", get(list::<Key>))
        .route("/v1/keys/charts", get(keys_charts))
        .route(
            "/v1/keyring/{id}",
            get(fetch::<KeyRing>)
                .post(create::<KeyRing>)
                .put(update::<KeyRing>)
                .delete(remove::<KeyRing>),
        )
        .route("/v1/keyring/{id}/linkkey/{key}", put(keyring_link_key))
        .route("/v1/keyring/{id}/unlinkkey/{key}", put(keyring_unlink_key))
        .route("/v1/keyring/{id}/keys", get(keyring_keys))
        .route("/v1/keyring/{id}/stats", get(keyring_stats))
        .route("/v1/keyrings", get(list::<KeyRing>))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    serve(listener, Db::default()).await
}

pub async fn serve(listener: TcpListener, db: Db) -> Result<(), std::io::Error> {
    axum::serve(listener, router(db)).await
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

fn envelope(status: StatusCode, results: Value) -> Value {
    json!({
        "meta": {"version": 1, "status_code": status.as_u16()},
        "results": results,
    })
}

fn ok(results: Value) -> Json<Value> {
    Json(envelope(StatusCode::OK, results))
}

fn to_results<T: Serialize>(value: &T) -> Result<Json<Value>, AxleError> {
    serde_json::to_value(value)
        .map(ok)
        .map_err(|e| AxleError::internal(e.to_string()))
}

/// An error rendered inside the envelope.
#[derive(Debug)]
pub struct AxleError {
    status: StatusCode,
    kind: String,
    message: String,
}

impl AxleError {
    pub fn not_found(label: &str, id: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            kind: format!("{label}NotFoundError"),
            message: format!("{label} '{id}' not found."),
        }
    }

    pub fn already_exists(label: &str, id: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: "AlreadyExists".to_string(),
            message: format!("{label} '{id}' already exists."),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: "ValidationError".to_string(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            kind: "InternalError".to_string(),
            message: message.into(),
        }
    }
}

impl IntoResponse for AxleError {
    fn into_response(self) -> Response {
        debug!(
            status = self.status.as_u16(),
            kind = %self.kind,
            message = %self.message,
            "request rejected"
        );
        let body = envelope(
            self.status,
            json!({"error": {"type": self.kind, "message": self.message}}),
        );
        (self.status, Json(body)).into_response()
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

fn now_seconds() -> i64 {
    now_millis() / 1_000
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

async fn server_info(State(db): State<Db>) -> Json<Value> {
    let store = db.read().await;
    ok(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "apis": store.apis.len(),
        "keys": store.keys.len(),
        "keyrings": store.keyrings.len(),
    }))
}

async fn ping() -> &'static str {
    "pong"
}

// ---------------------------------------------------------------------------
// CRUD, shared by every entity kind
// ---------------------------------------------------------------------------

fn decode<R: Stored>(body: Value) -> Result<R, AxleError> {
    let entity: R = serde_json::from_value(body).map_err(|e| AxleError::invalid(e.to_string()))?;
    entity.validate()?;
    Ok(entity)
}

async fn fetch<R: Stored>(
    State(db): State<Db>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AxleError> {
    let store = db.read().await;
    let entity = R::table(&store)
        .get(&id)
        .ok_or_else(|| AxleError::not_found(R::LABEL, &id))?;
    to_results(entity)
}

async fn create<R: Stored>(
    State(db): State<Db>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AxleError> {
    let mut entity: R = decode(body)?;
    let mut store = db.write().await;
    let table = R::table_mut(&mut store);
    if table.contains_key(&id) {
        return Err(AxleError::already_exists(R::LABEL, &id));
    }

    let now = now_millis();
    let (created_at, updated_at) = entity.timestamps();
    *created_at = Some(now);
    updated_at.get_or_insert(now);

    table.insert(id.clone(), entity.clone());
    info!(kind = R::LABEL, %id, "created");
    to_results(&entity)
}

async fn update<R: Stored>(
    State(db): State<Db>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AxleError> {
    let mut entity: R = decode(body)?;
    let mut store = db.write().await;
    let table = R::table_mut(&mut store);
    let mut old = table
        .get(&id)
        .cloned()
        .ok_or_else(|| AxleError::not_found(R::LABEL, &id))?;

    entity.carry_over(&old);
    let now = now_millis();
    let created = *old.timestamps().0;
    let (created_at, updated_at) = entity.timestamps();
    *created_at = created.or(Some(now));
    updated_at.get_or_insert(now);

    table.insert(id.clone(), entity.clone());
    info!(kind = R::LABEL, %id, "updated");
    let results = json!({
        "old": serde_json::to_value(&old).map_err(|e| AxleError::internal(e.to_string()))?,
        "new": serde_json::to_value(&entity).map_err(|e| AxleError::internal(e.to_string()))?,
    });
    Ok(ok(results))
}

async fn remove<R: Stored>(
    State(db): State<Db>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AxleError> {
    let mut store = db.write().await;
    if R::table_mut(&mut store).remove(&id).is_none() {
        return Err(AxleError::not_found(R::LABEL, &id));
    }
    R::forget(&mut store, &id);
    info!(kind = R::LABEL, %id, "deleted");
    Ok(ok(Value::Bool(true)))
}

/// Paging parameters; `from` and `to` are inclusive positions.
#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    from: usize,
    #[serde(default = "default_to")]
    to: usize,
    #[serde(default)]
    resolve: bool,
}

fn default_to() -> usize {
    10
}

impl Page {
    fn take(&self) -> usize {
        self.to.saturating_sub(self.from) + 1
    }
}

/// Render `(id, entity)` pairs as `{id: entity}` when resolving, otherwise
/// as a list of identifiers.
fn page_of<'a, R: Stored>(
    entries: impl Iterator<Item = (&'a String, &'a R)>,
    page: &Page,
) -> Result<Json<Value>, AxleError> {
    let entries = entries.skip(page.from).take(page.take());
    if page.resolve {
        let resolved: BTreeMap<&String, &R> = entries.collect();
        to_results(&resolved)
    } else {
        let ids: Vec<&String> = entries.map(|(id, _)| id).collect();
        to_results(&ids)
    }
}

async fn list<R: Stored>(
    State(db): State<Db>,
    Query(page): Query<Page>,
) -> Result<Json<Value>, AxleError> {
    let store = db.read().await;
    page_of(R::table(&store).iter(), &page)
}

// ---------------------------------------------------------------------------
// Relationships
// ---------------------------------------------------------------------------

async fn api_link_key(
    State(db): State<Db>,
    Path((api, key)): Path<(String, String)>,
) -> Result<Json<Value>, AxleError> {
    let mut guard = db.write().await;
    let store = &mut *guard;
    if !store.apis.contains_key(&api) {
        return Err(AxleError::not_found(Api::LABEL, &api));
    }
    let entry = store
        .keys
        .get_mut(&key)
        .ok_or_else(|| AxleError::not_found(Key::LABEL, &key))?;
    if !entry.for_apis.contains(&api) {
        entry.for_apis.push(api.clone());
    }
    info!(%api, %key, "linked key to api");
    to_results(entry)
}

async fn api_unlink_key(
    State(db): State<Db>,
    Path((api, key)): Path<(String, String)>,
) -> Result<Json<Value>, AxleError> {
    let mut guard = db.write().await;
    let store = &mut *guard;
    if !store.apis.contains_key(&api) {
        return Err(AxleError::not_found(Api::LABEL, &api));
    }
    let entry = store
        .keys
        .get_mut(&key)
        .ok_or_else(|| AxleError::not_found(Key::LABEL, &key))?;
    entry.for_apis.retain(|linked| linked != &api);
    info!(%api, %key, "unlinked key from api");
    to_results(entry)
}

async fn api_keys(
    State(db): State<Db>,
    Path(api): Path<String>,
    Query(page): Query<Page>,
) -> Result<Json<Value>, AxleError> {
    let store = db.read().await;
    if !store.apis.contains_key(&api) {
        return Err(AxleError::not_found(Api::LABEL, &api));
    }
    page_of(store.keys.iter().filter(|(_, k)| k.for_apis.contains(&api)), &page)
}

async fn key_apis(
    State(db): State<Db>,
    Path(key): Path<String>,
    Query(page): Query<Page>,
) -> Result<Json<Value>, AxleError> {
    let store = db.read().await;
    let entry = store
        .keys
        .get(&key)
        .ok_or_else(|| AxleError::not_found(Key::LABEL, &key))?;
    page_of(
        store.apis.iter().filter(|(id, _)| entry.for_apis.contains(id)),
        &page,
    )
}

async fn keyring_link_key(
    State(db): State<Db>,
    Path((ring, key)): Path<(String, String)>,
) -> Result<Json<Value>, AxleError> {
    let mut guard = db.write().await;
    let store = &mut *guard;
    let entry = store
        .keys
        .get(&key)
        .ok_or_else(|| AxleError::not_found(Key::LABEL, &key))?;
    let keyring = store
        .keyrings
        .get_mut(&ring)
        .ok_or_else(|| AxleError::not_found(KeyRing::LABEL, &ring))?;
    keyring.keys.insert(key.clone());
    info!(%ring, %key, "linked key to keyring");
    to_results(entry)
}

async fn keyring_unlink_key(
    State(db): State<Db>,
    Path((ring, key)): Path<(String, String)>,
) -> Result<Json<Value>, AxleError> {
    let mut guard = db.write().await;
    let store = &mut *guard;
    let entry = store
        .keys
        .get(&key)
        .ok_or_else(|| AxleError::not_found(Key::LABEL, &key))?;
    let keyring = store
        .keyrings
        .get_mut(&ring)
        .ok_or_else(|| AxleError::not_found(KeyRing::LABEL, &ring))?;
    keyring.keys.remove(&key);
    info!(%ring, %key, "unlinked key from keyring");
    to_results(entry)
}

async fn keyring_keys(
    State(db): State<Db>,
    Path(ring): Path<String>,
    Query(page): Query<Page>,
) -> Result<Json<Value>, AxleError> {
    let store = db.read().await;
    let keyring = store
        .keyrings
        .get(&ring)
        .ok_or_else(|| AxleError::not_found(KeyRing::LABEL, &ring))?;
    page_of(
        store.keys.iter().filter(|(id, _)| keyring.keys.contains(*id)),
        &page,
    )
}

// ---------------------------------------------------------------------------
// Stats and charts
// ---------------------------------------------------------------------------

async fn api_stats(
    State(db): State<Db>,
    Path(api): Path<String>,
    Query(params): Query<StatsParams>,
) -> Result<Json<Value>, AxleError> {
    let store = db.read().await;
    if !store.apis.contains_key(&api) {
        return Err(AxleError::not_found(Api::LABEL, &api));
    }
    Ok(ok(hits::stats(store.hits.iter().filter(|h| h.api == api), &params)))
}

async fn key_stats(
    State(db): State<Db>,
    Path(key): Path<String>,
    Query(params): Query<StatsParams>,
) -> Result<Json<Value>, AxleError> {
    let store = db.read().await;
    if !store.keys.contains_key(&key) {
        return Err(AxleError::not_found(Key::LABEL, &key));
    }
    Ok(ok(hits::stats(store.hits.iter().filter(|h| h.key == key), &params)))
}

async fn keyring_stats(
    State(db): State<Db>,
    Path(ring): Path<String>,
    Query(params): Query<StatsParams>,
) -> Result<Json<Value>, AxleError> {
    let store = db.read().await;
    let keyring = store
        .keyrings
        .get(&ring)
        .ok_or_else(|| AxleError::not_found(KeyRing::LABEL, &ring))?;
    Ok(ok(hits::stats(
        store.hits.iter().filter(|h| keyring.keys.contains(&h.key)),
        &params,
    )))
}

async fn api_key_charts(
    State(db): State<Db>,
    Path(api): Path<String>,
    Query(params): Query<ChartParams>,
) -> Result<Json<Value>, AxleError> {
    let store = db.read().await;
    if !store.apis.contains_key(&api) {
        return Err(AxleError::not_found(Api::LABEL, &api));
    }
    let hits = store.hits.iter().filter(|h| h.api == api);
    to_results(&hits::chart(hits, params.granularity, now_seconds(), |h| h.key.as_str()))
}

async fn apis_charts(
    State(db): State<Db>,
    Query(params): Query<ChartParams>,
) -> Result<Json<Value>, AxleError> {
    let store = db.read().await;
    to_results(&hits::chart(store.hits.iter(), params.granularity, now_seconds(), |h| {
        h.api.as_str()
    }))
}

async fn key_api_charts(
    State(db): State<Db>,
    Path(key): Path<String>,
    Query(params): Query<ChartParams>,
) -> Result<Json<Value>, AxleError> {
    let store = db.read().await;
    if !store.keys.contains_key(&key) {
        return Err(AxleError::not_found(Key::LABEL, &key));
    }
    let hits = store.hits.iter().filter(|h| h.key == key);
    to_results(&hits::chart(hits, params.granularity, now_seconds(), |h| h.api.as_str()))
}

async fn keys_charts(
    State(db): State<Db>,
    Query(params): Query<ChartParams>,
) -> Result<Json<Value>, AxleError> {
    let store = db.read().await;
    to_results(&hits::chart(store.hits.iter(), params.granularity, now_seconds(), |h| {
        h.key.as_str()
    }))
}
