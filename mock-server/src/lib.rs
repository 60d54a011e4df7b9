use std::{collections::HashMap, sync::Arc, time::Duration};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

/// Header some servers use to report a status the transport never saw.
pub const RESPONDED_JSON: &str = "X-Responded-JSON";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: Uuid,
    pub name: String,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct CreateItem {
    pub name: String,
    #[serde(default)]
    pub quantity: u32,
}

/// What `/api/echo` saw of the incoming request.
#[derive(Debug, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub headers: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub body: String,
}

pub type Db = Arc<RwLock<HashMap<Uuid, Item>>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(HashMap::new()));
    Router::new()
        .route("/api/items", get(list_items).post(create_item))
        .route("/api/items/{id}", get(get_item))
        .route("/api/echo", any(echo))
        .route("/api/status/{code}", any(status))
        .route("/api/responded/{code}", get(responded))
        .route("/api/responded-malformed", get(responded_malformed))
        .route("/api/slow/{ms}", get(slow))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn message(text: impl Into<String>) -> Json<Value> {
    Json(json!({ "Message": text.into() }))
}

async fn list_items(
    State(db): State<Db>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Vec<Item>> {
    let items = db.read().await;
    let mut items: Vec<Item> = items
        .values()
        .filter(|item| query.get("name").map_or(true, |name| &item.name == name))
        .cloned()
        .collect();
    items.sort_by(|a, b| a.name.cmp(&b.name));
    Json(items)
}

async fn create_item(State(db): State<Db>, Json(input): Json<CreateItem>) -> (StatusCode, Json<Item>) {
    let item = Item {
        id: Uuid::new_v4(),
        name: input.name,
        quantity: input.quantity,
    };
    tracing::debug!(id = %item.id, name = %item.name, "item created");
    db.write().await.insert(item.id, item.clone());
    (StatusCode::CREATED, Json(item))
}

async fn get_item(State(db): State<Db>, Path(id): Path<Uuid>) -> Response {
    let items = db.read().await;
    match items.get(&id) {
        Some(item) => Json(item.clone()).into_response(),
        None => (StatusCode::NOT_FOUND, message(format!("no item with id {id}"))).into_response(),
    }
}

async fn echo(
    method: Method,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    body: String,
) -> Json<Echo> {
    let headers = headers
        .iter()
        .filter_map(|(name, value)| Some((name.to_string(), value.to_str().ok()?.to_string())))
        .collect();
    Json(Echo {
        method: method.to_string(),
        headers,
        query,
        body,
    })
}

/// Respond with the requested status and a JSON error body.
async fn status(Path(code): Path<u16>) -> Response {
    let Ok(status) = StatusCode::from_u16(code) else {
        return (StatusCode::BAD_REQUEST, message("invalid status code")).into_response();
    };
    (status, [("X-Status-Echo", code.to_string())], message(format!("status {code}"))).into_response()
}

/// A 200 on the wire that reports `code` through `X-Responded-JSON`.
async fn responded(Path(code): Path<u16>) -> Response {
    let payload = json!({ "status": code, "headers": { "X-Extra": "v" } });
    (
        StatusCode::OK,
        [(RESPONDED_JSON, payload.to_string())],
        message("Authorization has been denied for this request."),
    )
        .into_response()
}

async fn responded_malformed() -> Response {
    (StatusCode::OK, [(RESPONDED_JSON, "{status:")], Json(json!({ "ok": true }))).into_response()
}

async fn slow(Path(ms): Path<u64>) -> Json<Value> {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    Json(json!({ "slept": ms }))
}
