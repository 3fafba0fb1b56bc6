//! In-process stand-in for the archive backend, bound to an ephemeral port.

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Query, RawQuery, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use shared::{
    domain::Resource,
    protocol::{InsightRequest, InsightResponse},
};
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Debug, Clone, PartialEq)]
pub struct CapturedRequest {
    pub method: &'static str,
    pub path: String,
    pub query: Option<String>,
    pub body: Option<Value>,
}

#[derive(Clone, Default)]
pub struct ServerState {
    pub requests: Arc<Mutex<Vec<CapturedRequest>>>,
}

impl ServerState {
    async fn record(&self, request: CapturedRequest) {
        self.requests.lock().await.push(request);
    }

    pub async fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn last_query_pairs(&self) -> Vec<(String, String)> {
        let requests = self.requests.lock().await;
        let query = requests
            .last()
            .and_then(|request| request.query.clone())
            .unwrap_or_default();
        url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect()
    }
}

fn luke(id: Value) -> Value {
    json!({
        "id": id,
        "name": "Luke Skywalker",
        "height": "172",
        "mass": "77",
        "hair_color": "blond",
        "skin_color": "fair",
        "eye_color": "blue",
        "birth_year": "19BBY",
        "gender": "male"
    })
}

fn id_value(raw: &str) -> Value {
    raw.parse::<i64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::from(raw))
}

async fn list_people(State(state): State<ServerState>, RawQuery(query): RawQuery) -> Json<Value> {
    state
        .record(CapturedRequest {
            method: "GET",
            path: "/api/people/".into(),
            query: query.clone(),
            body: None,
        })
        .await;

    let params: HashMap<String, String> =
        url::form_urlencoded::parse(query.unwrap_or_default().as_bytes())
            .into_owned()
            .collect();
    if params.get("name").map(String::as_str) == Some("ghost") {
        return Json(json!({ "detail": "nothing here" }));
    }
    let page: u32 = params.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    let size: u32 = params.get("size").and_then(|s| s.parse().ok()).unwrap_or(15);
    Json(json!({
        "items": [luke(json!(1))],
        "total": 82,
        "page": page,
        "size": size,
        "pages": 82_u32.div_ceil(size),
        "has_next": page * size < 82,
        "has_prev": page > 1
    }))
}

async fn list_planets(State(state): State<ServerState>, RawQuery(query): RawQuery) -> StatusCode {
    state
        .record(CapturedRequest {
            method: "GET",
            path: "/api/planets/".into(),
            query,
            body: None,
        })
        .await;
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn show_person(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    state
        .record(CapturedRequest {
            method: "GET",
            path: format!("/api/people/{id}/"),
            query: None,
            body: None,
        })
        .await;
    if id == "404" {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(luke(id_value(&id))))
}

async fn update_person(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(patch): Json<Value>,
) -> Json<Value> {
    state
        .record(CapturedRequest {
            method: "PUT",
            path: format!("/api/people/{id}/"),
            query: None,
            body: Some(patch.clone()),
        })
        .await;
    let mut record = luke(id_value(&id));
    if let (Some(record), Some(patch)) = (record.as_object_mut(), patch.as_object()) {
        for (field, value) in patch {
            record.insert(field.clone(), value.clone());
        }
    }
    Json(record)
}

async fn show_planet(Path(_id): Path<String>) -> &'static str {
    "definitely not json"
}

fn insight_for(request: InsightRequest) -> InsightResponse {
    let confidence_score = if request.name == "Overconfident" { 1.5 } else { 0.87 };
    InsightResponse {
        insight: format!("{} warrants deeper examination.", request.name),
        name: request.name,
        entity_type: request.entity_type,
        confidence_score,
        generated_at: "2024-05-04T10:15:30.123456".into(),
        model_version: "v1.0".into(),
    }
}

async fn insight_post(
    State(state): State<ServerState>,
    Json(request): Json<InsightRequest>,
) -> Json<InsightResponse> {
    state
        .record(CapturedRequest {
            method: "POST",
            path: "/api/simulate-ai-insight/".into(),
            query: None,
            body: serde_json::to_value(&request).ok(),
        })
        .await;
    Json(insight_for(request))
}

async fn insight_get(
    State(state): State<ServerState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<InsightResponse>, StatusCode> {
    state
        .record(CapturedRequest {
            method: "GET",
            path: "/api/simulate-ai-insight/".into(),
            query: None,
            body: None,
        })
        .await;
    let name = params.get("name").cloned().ok_or(StatusCode::UNPROCESSABLE_ENTITY)?;
    let entity_type: Resource = params
        .get("entity_type")
        .and_then(|raw| raw.parse().ok())
        .ok_or(StatusCode::BAD_REQUEST)?;
    Ok(Json(insight_for(InsightRequest { name, entity_type })))
}

/// Returns the API base url (`http://127.0.0.1:<port>/api`) and the capture
/// of every request served.
pub async fn spawn_archive_server() -> std::io::Result<(String, ServerState)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = ServerState::default();
    let app = Router::new()
        .route("/api/people/", get(list_people))
        .route("/api/people/:id/", get(show_person).put(update_person))
        .route("/api/planets/", get(list_planets))
        .route("/api/planets/:id/", get(show_planet))
        .route(
            "/api/simulate-ai-insight/",
            get(insight_get).post(insight_post),
        )
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}/api"), state))
}
