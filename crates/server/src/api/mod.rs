//! Collection operations behind the HTTP surface.
//!
//! Each function validates its input, performs one storage call and maps
//! failures onto [`ApiError`]. Publishing the resulting snapshot is left to
//! the caller so these stay usable without a running broadcast channel.

use shared::{
    domain::{is_valid_collection_name, EventFields, EventId, EventPatch, EventRecord},
    error::ApiError,
    protocol::ServerEvent,
};
use storage::Storage;
use tracing::error;

pub mod http;

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
}

pub async fn list_events(ctx: &ApiContext, collection: &str) -> Result<Vec<EventRecord>, ApiError> {
    ensure_collection_name(collection)?;
    ctx.storage.list_events(collection).await.map_err(internal)
}

pub async fn get_event(
    ctx: &ApiContext,
    collection: &str,
    id: &EventId,
) -> Result<EventRecord, ApiError> {
    ensure_collection_name(collection)?;
    ctx.storage
        .get_event(collection, id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found(format!("event '{id}' not found")))
}

pub async fn snapshot(ctx: &ApiContext, collection: &str) -> Result<ServerEvent, ApiError> {
    let records = list_events(ctx, collection).await?;
    Ok(ServerEvent::Snapshot {
        collection: collection.to_string(),
        records,
    })
}

pub async fn create_event(
    ctx: &ApiContext,
    collection: &str,
    fields: &EventFields,
) -> Result<EventId, ApiError> {
    ensure_collection_name(collection)?;
    ctx.storage
        .insert_event(collection, fields)
        .await
        .map_err(internal)
}

pub async fn patch_event(
    ctx: &ApiContext,
    collection: &str,
    id: &EventId,
    patch: &EventPatch,
) -> Result<(), ApiError> {
    ensure_collection_name(collection)?;
    let found = ctx
        .storage
        .update_event_partial(collection, id, patch)
        .await
        .map_err(internal)?;
    if !found {
        return Err(ApiError::not_found(format!("event '{id}' not found")));
    }
    Ok(())
}

pub async fn replace_event(
    ctx: &ApiContext,
    collection: &str,
    id: &EventId,
    fields: &EventFields,
) -> Result<(), ApiError> {
    ensure_collection_name(collection)?;
    let found = ctx
        .storage
        .update_event_full(collection, id, fields)
        .await
        .map_err(internal)?;
    if !found {
        return Err(ApiError::not_found(format!("event '{id}' not found")));
    }
    Ok(())
}

/// Returns whether anything was deleted. A missing id is not an error.
pub async fn delete_event(
    ctx: &ApiContext,
    collection: &str,
    id: &EventId,
) -> Result<bool, ApiError> {
    ensure_collection_name(collection)?;
    ctx.storage
        .delete_event(collection, id)
        .await
        .map_err(internal)
}

fn ensure_collection_name(collection: &str) -> Result<(), ApiError> {
    if is_valid_collection_name(collection) {
        Ok(())
    } else {
        Err(ApiError::validation(format!(
            "invalid collection name '{collection}'"
        )))
    }
}

fn internal(err: anyhow::Error) -> ApiError {
    error!(error = %err, "storage operation failed");
    ApiError::internal(err.to_string())
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
