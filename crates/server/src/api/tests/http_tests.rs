use super::*;
use crate::api::ApiContext;
use axum::{body, body::Body, http::Request};
use shared::domain::Estado;
use std::{
    env, fs,
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use storage::Storage;
use tokio::{sync::broadcast::error::TryRecvError, time::timeout};
use tower::ServiceExt;

async fn test_app() -> (Router, Arc<AppState>) {
    app_with("sqlite::memory:", 32).await
}

async fn app_with(database_url: &str, capacity: usize) -> (Router, Arc<AppState>) {
    let storage = Storage::new(database_url).await.expect("db");
    let state = Arc::new(AppState::new(ApiContext { storage }, capacity));
    (build_router(Arc::clone(&state)), state)
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

async fn create(app: &Router, nombre: &str, track: &str, estado: &str) -> EventId {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/collections/devfest/events",
            serde_json::json!({
                "nombre": nombre,
                "expo": "Speaker",
                "hora": "09:00",
                "track": track,
                "estado": estado,
            }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let created: CreatedResponse = serde_json::from_slice(&bytes).expect("json");
    created.id
}

async fn list(app: &Router) -> Vec<EventRecord> {
    let response = app
        .clone()
        .oneshot(
            Request::get("/collections/devfest/events")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

#[tokio::test]
async fn healthz_reports_ok_when_storage_is_ready() {
    let (app, _state) = test_app().await;
    let response = app
        .oneshot(Request::get("/healthz").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(body.as_ref(), b"ok");
}

#[tokio::test]
async fn create_then_list_round_trips_fields() {
    let (app, _state) = test_app().await;
    let id = create(&app, "Keynote", "Main", "in_progress").await;

    let records = list(&app).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, id);
    assert_eq!(records[0].fields.nombre, "Keynote");
    assert_eq!(records[0].fields.estado, Estado::InProgress);
}

#[tokio::test]
async fn create_publishes_snapshot_to_subscribers() {
    let (app, state) = test_app().await;
    let mut events = state.events.subscribe();

    let id = create(&app, "Keynote", "Main", "not_started").await;

    match events.recv().await.expect("event") {
        ServerEvent::Snapshot {
            collection,
            records,
        } => {
            assert_eq!(collection, "devfest");
            assert_eq!(records.len(), 1);
            assert_eq!(records[0].id, id);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn patch_updates_only_estado() {
    let (app, _state) = test_app().await;
    let id = create(&app, "Keynote", "Main", "not_started").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/collections/devfest/events/{id}"),
            serde_json::json!({ "estado": "finished" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let records = list(&app).await;
    assert_eq!(records[0].fields.estado, Estado::Finished);
    assert_eq!(records[0].fields.nombre, "Keynote");
}

#[tokio::test]
async fn put_on_missing_event_is_not_found() {
    let (app, _state) = test_app().await;
    let response = app
        .oneshot(json_request(
            "PUT",
            "/collections/devfest/events/missing",
            serde_json::json!({
                "nombre": "x", "expo": "y", "hora": "z", "track": "t", "estado": "finished"
            }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_is_idempotent_over_http() {
    let (app, _state) = test_app().await;
    let id = create(&app, "Keynote", "Main", "not_started").await;
    let uri = format!("/collections/devfest/events/{id}");

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(
                Request::delete(uri.as_str())
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
    assert!(list(&app).await.is_empty());
}

#[tokio::test]
async fn invalid_collection_is_bad_request() {
    let (app, _state) = test_app().await;
    let response = app
        .oneshot(
            Request::get("/collections/bad.name/events")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

async fn patch_estado(app: Router, id: EventId, estado: &'static str) {
    let response = app
        .oneshot(json_request(
            "PATCH",
            &format!("/collections/devfest/events/{id}"),
            serde_json::json!({ "estado": estado }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_writes_end_on_the_newest_snapshot() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let root = env::temp_dir().join(format!("session_board_publish_{suffix}"));
    let database_url = format!("sqlite://{}", root.join("board.db").display());
    let (app, state) = app_with(&database_url, 64).await;

    let mut ids = Vec::new();
    for i in 0..16 {
        ids.push(create(&app, &format!("talk {i}"), "Main", "not_started").await);
    }

    let targets = [("finished", Estado::Finished), ("in_progress", Estado::InProgress)];
    for round in 0..6 {
        let (wire, estado) = targets[round % 2];
        let mut events = state.events.subscribe();
        let writes: Vec<_> = ids
            .iter()
            .map(|id| tokio::spawn(patch_estado(app.clone(), id.clone(), wire)))
            .collect();
        for write in writes {
            write.await.expect("write task");
        }

        let mut last = None;
        loop {
            match events.try_recv() {
                Ok(ServerEvent::Snapshot { records, .. }) => last = Some(records),
                Ok(other) => panic!("unexpected event: {other:?}"),
                Err(TryRecvError::Empty) => break,
                Err(err) => panic!("receive failed: {err}"),
            }
        }
        let last = last.expect("at least one snapshot");
        let done = last.iter().filter(|r| r.fields.estado == estado).count();
        assert_eq!(done, ids.len(), "round {round}: last snapshot is stale");
    }

    drop(app);
    drop(state);
    let _ = fs::remove_dir_all(root);
}

#[tokio::test]
async fn lagging_subscriber_gets_one_fresh_listing() {
    let (app, state) = app_with("sqlite::memory:", 1).await;
    let mut events = state.events.subscribe();

    create(&app, "Keynote", "Main", "not_started").await;
    create(&app, "Async Rust", "Backend", "in_progress").await;
    create(&app, "Closing", "Main", "not_started").await;

    let event = timeout(Duration::from_secs(2), next_event(&state, &mut events, "devfest"))
        .await
        .expect("event in time")
        .expect("channel open");
    match event {
        ServerEvent::Snapshot { collection, records } => {
            assert_eq!(collection, "devfest");
            let names: Vec<_> = records.iter().map(|r| r.fields.nombre.as_str()).collect();
            assert_eq!(names, vec!["Keynote", "Async Rust", "Closing"]);
        }
        other => panic!("unexpected event: {other:?}"),
    }
    // The skipped snapshots are not replayed afterwards.
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn subscriber_skips_other_collections() {
    let (app, state) = test_app().await;
    let mut events = state.events.subscribe();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/collections/other/events",
            serde_json::json!({ "nombre": "x", "expo": "y", "hora": "z", "track": "t" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = create(&app, "Keynote", "Main", "not_started").await;

    let event = timeout(Duration::from_secs(2), next_event(&state, &mut events, "devfest"))
        .await
        .expect("event in time")
        .expect("channel open");
    match event {
        ServerEvent::Snapshot { collection, records } => {
            assert_eq!(collection, "devfest");
            assert_eq!(records[0].id, id);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}
