use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use khidma_core::api::{ApiClient, ApiError, ClientSettings, SessionHooks};
use khidma_core::models::{NoteTarget, RetreatInput, Role, ServantUpdate};
use khidma_core::resources::{notes, retreats, servantees, servants};
use serde_json::{Value, json};

#[derive(Default)]
struct Recorder {
    pages_requested: Mutex<Vec<String>>,
    last_body: Mutex<Option<Value>>,
    last_path_id: Mutex<Option<String>>,
}

async fn servantee_pages(
    State(recorder): State<Arc<Recorder>>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let page: usize = params
        .get("page")
        .and_then(|page| page.parse().ok())
        .unwrap_or(1);
    recorder
        .pages_requested
        .lock()
        .unwrap()
        .push(format!("{}:{}", page, params.get("limit").cloned().unwrap_or_default()));

    let data: Vec<Value> = if page <= 3 {
        vec![json!({ "_id": format!("s{page}"), "name": format!("Servantee {page}") })]
    } else {
        Vec::new()
    };
    Json(json!({ "data": data, "pages": 3, "total": 3 }))
}

async fn bare_retreats() -> Json<Value> {
    Json(json!([
        { "_id": "r1", "name": "Winter", "attendees": ["s1"] },
        { "_id": "r2", "name": "Summer", "attendees": [] }
    ]))
}

async fn retreat(Path(id): Path<String>) -> Json<Value> {
    Json(json!({
        "_id": id,
        "name": "Winter",
        "attendees": ["s1", { "_id": "s2", "name": "Mina" }]
    }))
}

async fn update_retreat(
    State(recorder): State<Arc<Recorder>>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Json<Value> {
    *recorder.last_body.lock().unwrap() = Some(body.clone());
    Json(json!({
        "_id": id,
        "name": "Winter",
        "location": body["location"],
        "attendees": body.get("attendees").cloned().unwrap_or_else(|| json!([]))
    }))
}

async fn servantee_history(
    State(recorder): State<Arc<Recorder>>,
    Path(id): Path<String>,
) -> Json<Value> {
    *recorder.last_path_id.lock().unwrap() = Some(id);
    Json(json!([
        { "_id": "r2", "name": "Summer", "startDate": "2025-07-01T00:00:00Z" },
        { "_id": "r1", "name": "Winter", "startDate": "2025-01-10T00:00:00Z" }
    ]))
}

async fn update_servant(
    State(recorder): State<Arc<Recorder>>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Json<Value> {
    *recorder.last_body.lock().unwrap() = Some(body.clone());
    Json(json!({
        "_id": id,
        "name": "Fady",
        "email": "fady@example.com",
        "role": body.get("role").cloned().unwrap_or_else(|| json!("Servant"))
    }))
}

async fn create_note(State(recorder): State<Arc<Recorder>>, Json(body): Json<Value>) -> Response {
    *recorder.last_body.lock().unwrap() = Some(body.clone());
    (
        StatusCode::CREATED,
        Json(json!({ "_id": "n1", "content": body["content"] })),
    )
        .into_response()
}

async fn spawn_backend() -> (ApiClient, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let app = Router::new()
        .route("/servantees", get(servantee_pages))
        .route("/retreats", get(bare_retreats))
        .route("/retreats/:id", get(retreat).patch(update_retreat))
        .route("/retreats/servantee/:id", get(servantee_history))
        .route("/users/:id", patch(update_servant))
        .route("/notes", post(create_note))
        .with_state(Arc::clone(&recorder));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind backend");
    let addr = listener.local_addr().expect("backend address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve backend");
    });

    let client = ApiClient::new(
        ClientSettings::new(format!("http://{addr}")),
        SessionHooks::default(),
    )
    .expect("client");
    (client, recorder)
}

#[tokio::test]
async fn fetch_all_walks_every_reported_page() {
    let (client, recorder) = spawn_backend().await;

    let all = servantees::fetch_all(&client).await.expect("fetch all");
    let ids: Vec<&str> = all.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["s1", "s2", "s3"]);
    assert_eq!(
        *recorder.pages_requested.lock().unwrap(),
        vec!["1:100", "2:100", "3:100"]
    );
}

#[tokio::test]
async fn fetch_all_accepts_unpaged_collections() {
    let (client, _) = spawn_backend().await;

    let all = retreats::fetch_all(&client).await.expect("fetch all");
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].attendee_ids().collect::<Vec<_>>(), vec!["s1"]);
}

#[tokio::test]
async fn adding_an_attendee_sends_flattened_ids() {
    let (client, recorder) = spawn_backend().await;

    let updated = retreats::add_attendee(&client, "r1", "s3")
        .await
        .expect("add attendee");
    assert_eq!(
        recorder.last_body.lock().unwrap().clone(),
        Some(json!({ "attendees": ["s1", "s2", "s3"] }))
    );
    assert_eq!(updated.attendee_ids().count(), 3);
}

#[tokio::test]
async fn adding_a_registered_attendee_changes_nothing() {
    let (client, recorder) = spawn_backend().await;

    let unchanged = retreats::add_attendee(&client, "r1", "s2")
        .await
        .expect("add attendee");
    assert!(recorder.last_body.lock().unwrap().is_none());
    assert_eq!(unchanged.attendee_ids().count(), 2);
}

#[tokio::test]
async fn removing_an_attendee_keeps_the_rest() {
    let (client, recorder) = spawn_backend().await;

    retreats::remove_attendee(&client, "r1", "s1")
        .await
        .expect("remove attendee");
    assert_eq!(
        recorder.last_body.lock().unwrap().clone(),
        Some(json!({ "attendees": ["s2"] }))
    );
}

#[tokio::test]
async fn notes_name_their_owner() {
    let (client, recorder) = spawn_backend().await;

    let note = notes::create(&client, NoteTarget::Retreat, "r1", "  Bring blankets ")
        .await
        .expect("create note");
    assert_eq!(note.content, "Bring blankets");
    assert_eq!(
        recorder.last_body.lock().unwrap().clone(),
        Some(json!({ "content": "Bring blankets", "retreatId": "r1" }))
    );

    let err = notes::create(&client, NoteTarget::Servantee, "s1", "   ")
        .await
        .expect_err("blank note");
    assert!(matches!(err, ApiError::Invalid(_)));
}

#[tokio::test]
async fn servantee_history_uses_an_encoded_id() {
    let (client, recorder) = spawn_backend().await;

    let history = retreats::for_servantee(&client, "s/1")
        .await
        .expect("servantee history");
    let names: Vec<&str> = history.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Summer", "Winter"]);
    assert_eq!(recorder.last_path_id.lock().unwrap().as_deref(), Some("s/1"));
}

#[tokio::test]
async fn retreat_update_sends_only_changed_fields() {
    let (client, recorder) = spawn_backend().await;

    let changes = RetreatInput {
        location: Some("Wadi El Natrun".to_string()),
        ..RetreatInput::default()
    };
    let updated = retreats::update(&client, "r1", &changes)
        .await
        .expect("update retreat");
    assert_eq!(updated.location.as_deref(), Some("Wadi El Natrun"));
    assert_eq!(
        recorder.last_body.lock().unwrap().clone(),
        Some(json!({ "location": "Wadi El Natrun" }))
    );
}

#[tokio::test]
async fn servant_update_patches_the_account() {
    let (client, recorder) = spawn_backend().await;

    let changes = ServantUpdate {
        role: Some(Role::Admin),
        ..ServantUpdate::default()
    };
    let updated = servants::update(&client, "u1", &changes)
        .await
        .expect("update servant");
    assert_eq!(updated.role, Role::Admin);
    assert_eq!(
        recorder.last_body.lock().unwrap().clone(),
        Some(json!({ "role": "Admin" }))
    );

    let err = servants::update(&client, "u1", &ServantUpdate::default())
        .await
        .expect_err("empty update");
    assert!(matches!(err, ApiError::Invalid(_)));
    let blank = ServantUpdate {
        email: Some("  ".to_string()),
        ..ServantUpdate::default()
    };
    assert!(servants::update(&client, "u1", &blank).await.is_err());
}
