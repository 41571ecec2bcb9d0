use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use futures::{Sink, SinkExt, StreamExt};
use shared::{
    domain::{EventFields, EventId, EventPatch, EventRecord},
    error::{ApiError, ErrorCode},
    protocol::{CreatedResponse, ServerEvent},
};
use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};
use tracing::{debug, info, warn};

use crate::{api, app_state::AppState};

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(
            "/collections/:collection/events",
            get(http_list_events).post(http_create_event),
        )
        .route(
            "/collections/:collection/events/:event_id",
            get(http_get_event)
                .patch(http_patch_event)
                .put(http_replace_event)
                .delete(http_delete_event),
        )
        .route("/collections/:collection/ws", get(ws_handler))
        .with_state(state)
}

async fn healthz(State(state): State<Arc<AppState>>) -> ApiResult<&'static str> {
    state.api.storage.health_check().await.map_err(|e| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiError::internal(e.to_string())),
        )
    })?;
    Ok("ok")
}

async fn http_list_events(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
) -> ApiResult<Json<Vec<EventRecord>>> {
    let records = api::list_events(&state.api, &collection)
        .await
        .map_err(reject)?;
    Ok(Json(records))
}

async fn http_get_event(
    State(state): State<Arc<AppState>>,
    Path((collection, event_id)): Path<(String, String)>,
) -> ApiResult<Json<EventRecord>> {
    let record = api::get_event(&state.api, &collection, &EventId(event_id))
        .await
        .map_err(reject)?;
    Ok(Json(record))
}

async fn http_create_event(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
    Json(fields): Json<EventFields>,
) -> ApiResult<(StatusCode, Json<CreatedResponse>)> {
    let _publish = state.publish.lock().await;
    let id = api::create_event(&state.api, &collection, &fields)
        .await
        .map_err(reject)?;
    info!(%collection, event_id = %id, "event created");
    publish_snapshot(&state, &collection).await;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

async fn http_patch_event(
    State(state): State<Arc<AppState>>,
    Path((collection, event_id)): Path<(String, String)>,
    Json(patch): Json<EventPatch>,
) -> ApiResult<StatusCode> {
    let id = EventId(event_id);
    let _publish = state.publish.lock().await;
    api::patch_event(&state.api, &collection, &id, &patch)
        .await
        .map_err(reject)?;
    info!(%collection, event_id = %id, estado = ?patch.estado, "event patched");
    publish_snapshot(&state, &collection).await;
    Ok(StatusCode::NO_CONTENT)
}

async fn http_replace_event(
    State(state): State<Arc<AppState>>,
    Path((collection, event_id)): Path<(String, String)>,
    Json(fields): Json<EventFields>,
) -> ApiResult<StatusCode> {
    let id = EventId(event_id);
    let _publish = state.publish.lock().await;
    api::replace_event(&state.api, &collection, &id, &fields)
        .await
        .map_err(reject)?;
    info!(%collection, event_id = %id, "event replaced");
    publish_snapshot(&state, &collection).await;
    Ok(StatusCode::NO_CONTENT)
}

async fn http_delete_event(
    State(state): State<Arc<AppState>>,
    Path((collection, event_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let id = EventId(event_id);
    let _publish = state.publish.lock().await;
    let removed = api::delete_event(&state.api, &collection, &id)
        .await
        .map_err(reject)?;
    if removed {
        info!(%collection, event_id = %id, "event deleted");
        publish_snapshot(&state, &collection).await;
    } else {
        debug!(%collection, event_id = %id, "delete of unknown event ignored");
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Lists the collection again and fans the snapshot out to every socket.
/// Callers hold `state.publish` across their write and this call.
pub async fn publish_snapshot(state: &AppState, collection: &str) {
    match api::snapshot(&state.api, collection).await {
        Ok(event) => {
            // No subscribers is fine.
            let _ = state.events.send(event);
        }
        Err(err) => warn!(%collection, error = %err, "failed to build snapshot after write"),
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_connection(state, socket, collection))
}

async fn ws_connection(state: Arc<AppState>, socket: WebSocket, collection: String) {
    let (mut sender, mut receiver) = socket.split();

    // No write can land between subscribing and the first listing.
    let (mut events_rx, initial) = {
        let _publish = state.publish.lock().await;
        let events_rx = state.events.subscribe();
        (events_rx, api::snapshot(&state.api, &collection).await)
    };
    let initial = match initial {
        Ok(event) => event,
        Err(err) => {
            warn!(%collection, error = %err, "rejecting subscription");
            if let Ok(text) = serde_json::to_string(&ServerEvent::Error(err)) {
                let _ = sender.send(Message::Text(text)).await;
            }
            let _ = sender.close().await;
            return;
        }
    };
    if send_event(&mut sender, &initial).await.is_err() {
        return;
    }
    info!(%collection, "subscriber attached");

    let task_collection = collection.clone();
    let task_state = Arc::clone(&state);
    let send_task = tokio::spawn(async move {
        while let Some(event) = next_event(&task_state, &mut events_rx, &task_collection).await {
            if send_event(&mut sender, &event).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(_msg)) = receiver.next().await {}

    send_task.abort();
    info!(%collection, "subscriber detached");
}

/// Next event for a subscriber of `collection`. After a lag the skipped
/// snapshots are dropped and replaced by one fresh listing. `None` once the
/// channel is closed.
pub(crate) async fn next_event(
    state: &AppState,
    events_rx: &mut broadcast::Receiver<ServerEvent>,
    collection: &str,
) -> Option<ServerEvent> {
    loop {
        match events_rx.recv().await {
            Ok(ServerEvent::Snapshot {
                collection: ref changed,
                ..
            }) if changed != collection => continue,
            Ok(event) => return Some(event),
            Err(RecvError::Lagged(skipped)) => {
                warn!(%collection, skipped, "subscriber lagged; resending fresh snapshot");
                let _publish = state.publish.lock().await;
                // Whatever is still queued predates the listing below.
                loop {
                    match events_rx.try_recv() {
                        Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                        Err(_) => break,
                    }
                }
                return Some(match api::snapshot(&state.api, collection).await {
                    Ok(event) => event,
                    Err(err) => ServerEvent::Error(err),
                });
            }
            Err(RecvError::Closed) => return None,
        }
    }
}

async fn send_event<S>(sender: &mut S, event: &ServerEvent) -> Result<(), ()>
where
    S: Sink<Message> + Unpin,
{
    let text = serde_json::to_string(event).map_err(|_| ())?;
    sender.send(Message::Text(text)).await.map_err(|_| ())
}

fn reject(err: ApiError) -> (StatusCode, Json<ApiError>) {
    let status = match err.code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(err))
}

#[cfg(test)]
#[path = "tests/http_tests.rs"]
mod tests;
