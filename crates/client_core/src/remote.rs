use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response, StatusCode};
use shared::{
    domain::{EventFields, EventId, EventPatch},
    error::ApiError,
    protocol::{event_path, events_path, subscribe_path, CreatedResponse, ServerEvent},
};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    error::StoreError,
    store::{DocumentStore, Subscription, SubscriptionUpdate, SUBSCRIPTION_BUFFER},
};

/// [`DocumentStore`] backed by the board server: HTTP for writes, a
/// WebSocket per subscription for snapshots.
#[derive(Clone)]
pub struct RemoteStore {
    http: Client,
    base_url: Url,
}

impl RemoteStore {
    pub fn new(server_url: &str) -> Result<Self, StoreError> {
        let base_url = Url::parse(server_url)
            .map_err(|e| StoreError::InvalidUrl(format!("{server_url}: {e}")))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(StoreError::InvalidUrl(format!(
                "{server_url}: server_url must start with http:// or https://"
            )));
        }
        Ok(Self {
            http: Client::new(),
            base_url,
        })
    }

    /// Appends `segments` to the base url, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::InvalidUrl(format!("{} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn ws_endpoint(&self, collection: &str) -> Result<Url, StoreError> {
        let mut url = self.endpoint(&subscribe_path(collection))?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme).map_err(|_| {
            StoreError::InvalidUrl(format!("cannot derive websocket url from {url}"))
        })?;
        Ok(url)
    }
}

#[async_trait]
impl DocumentStore for RemoteStore {
    async fn subscribe(&self, collection: &str) -> Result<Subscription, StoreError> {
        let ws_url = self.ws_endpoint(collection)?;
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let feed = tokio::spawn(run_feed(ws_url, collection.to_string(), tx));
        Ok(Subscription::new(rx, feed))
    }

    async fn insert(&self, collection: &str, fields: &EventFields) -> Result<EventId, StoreError> {
        let res = self
            .http
            .post(self.endpoint(&events_path(collection))?)
            .json(fields)
            .send()
            .await?;
        let body: CreatedResponse = check(res).await?.json().await?;
        Ok(body.id)
    }

    async fn update_partial(
        &self,
        collection: &str,
        id: &EventId,
        patch: &EventPatch,
    ) -> Result<(), StoreError> {
        let res = self
            .http
            .patch(self.endpoint(&event_path(collection, id))?)
            .json(patch)
            .send()
            .await?;
        check(res).await?;
        Ok(())
    }

    async fn update_full(
        &self,
        collection: &str,
        id: &EventId,
        fields: &EventFields,
    ) -> Result<(), StoreError> {
        let res = self
            .http
            .put(self.endpoint(&event_path(collection, id))?)
            .json(fields)
            .send()
            .await?;
        check(res).await?;
        Ok(())
    }

    async fn delete_by_id(&self, collection: &str, id: &EventId) -> Result<(), StoreError> {
        let res = self
            .http
            .delete(self.endpoint(&event_path(collection, id))?)
            .send()
            .await?;
        if res.status() == StatusCode::NOT_FOUND {
            debug!(%collection, event_id = %id, "delete target already gone");
            return Ok(());
        }
        check(res).await?;
        Ok(())
    }
}

async fn check(res: Response) -> Result<Response, StoreError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res.text().await.unwrap_or_default();
    let error = match serde_json::from_str::<ApiError>(&body) {
        Ok(error) => error,
        Err(_) if body.is_empty() => ApiError::internal(status.to_string()),
        Err(_) => ApiError::internal(body),
    };
    Err(StoreError::Rejected {
        status: status.as_u16(),
        error,
    })
}

/// Forwards snapshots for `collection` until the socket fails, the store
/// closes it, or the subscription is dropped. A failure is reported once and
/// ends the feed.
async fn run_feed(ws_url: Url, collection: String, tx: mpsc::Sender<SubscriptionUpdate>) {
    let ws_stream = match connect_async(ws_url.as_str()).await {
        Ok((stream, _)) => stream,
        Err(err) => {
            let _ = tx
                .send(SubscriptionUpdate::Failed(StoreError::Transport(format!(
                    "failed to connect websocket {ws_url}: {err}"
                ))))
                .await;
            return;
        }
    };
    info!(%collection, "live subscription connected");
    let (_writer, mut reader) = ws_stream.split();

    let failure = loop {
        let Some(msg) = reader.next().await else {
            break StoreError::Closed;
        };
        match msg {
            Ok(Message::Text(text)) => match serde_json::from_str::<ServerEvent>(&text) {
                Ok(ServerEvent::Snapshot {
                    collection: pushed,
                    records,
                }) => {
                    if pushed != collection {
                        continue;
                    }
                    debug!(%collection, records = records.len(), "snapshot received");
                    if tx.send(SubscriptionUpdate::Snapshot(records)).await.is_err() {
                        // Reader dropped; nothing left to deliver to.
                        return;
                    }
                }
                Ok(ServerEvent::Error(err)) => break StoreError::Api(err),
                Err(err) => break StoreError::Decode(format!("invalid server event: {err}")),
            },
            Ok(Message::Close(_)) => break StoreError::Closed,
            Ok(_) => {}
            Err(err) => break StoreError::Transport(format!("websocket receive failed: {err}")),
        }
    };

    warn!(%collection, error = %failure, "live subscription ended");
    let _ = tx.send(SubscriptionUpdate::Failed(failure)).await;
}

#[cfg(test)]
#[path = "tests/remote_tests.rs"]
mod tests;
