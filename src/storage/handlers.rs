use axum::{Extension, Json, http::StatusCode};
use std::sync::Arc;

use super::protocol::{
    AckResponse, DeleteResponse, EntriesPayload, GetResponse, KeyRequest, KeyValue,
};
use crate::chord::node::ChordNode;
use crate::error::ChordError;
use crate::rpc::server::status_for;

pub async fn handle_put(
    Extension(node): Extension<Arc<ChordNode>>,
    Json(req): Json<KeyValue>,
) -> (StatusCode, Json<AckResponse>) {
    match node.put(req.key, req.value).await {
        Ok(()) => (StatusCode::OK, Json(AckResponse { success: true })),
        Err(e) => {
            tracing::error!("Failed to put at {}: {}", node.address(), e);
            (status_for(&e), Json(AckResponse { success: false }))
        }
    }
}

pub async fn handle_get(
    Extension(node): Extension<Arc<ChordNode>>,
    Json(req): Json<KeyRequest>,
) -> (StatusCode, Json<GetResponse>) {
    match node.get(&req.key).await {
        Some(value) => (StatusCode::OK, Json(GetResponse { value: Some(value) })),
        None => (StatusCode::NOT_FOUND, Json(GetResponse { value: None })),
    }
}

pub async fn handle_delete(
    Extension(node): Extension<Arc<ChordNode>>,
    Json(req): Json<KeyRequest>,
) -> (StatusCode, Json<DeleteResponse>) {
    match node.delete(&req.key).await {
        Ok(value) => (StatusCode::OK, Json(DeleteResponse { value: Some(value) })),
        Err(ChordError::NotFound(_)) => {
            (StatusCode::NOT_FOUND, Json(DeleteResponse { value: None }))
        }
        Err(e) => {
            tracing::error!("Failed to delete at {}: {}", node.address(), e);
            (status_for(&e), Json(DeleteResponse { value: None }))
        }
    }
}

pub async fn handle_put_on_backup(
    Extension(node): Extension<Arc<ChordNode>>,
    Json(req): Json<KeyValue>,
) -> (StatusCode, Json<AckResponse>) {
    node.put_on_backup(req.key, req.value).await;
    (StatusCode::OK, Json(AckResponse { success: true }))
}

pub async fn handle_delete_on_backup(
    Extension(node): Extension<Arc<ChordNode>>,
    Json(req): Json<KeyRequest>,
) -> (StatusCode, Json<AckResponse>) {
    match node.delete_on_backup(&req.key).await {
        Ok(()) => (StatusCode::OK, Json(AckResponse { success: true })),
        Err(e) => (status_for(&e), Json(AckResponse { success: false })),
    }
}

pub async fn handle_send_backup(
    Extension(node): Extension<Arc<ChordNode>>,
    Json(req): Json<EntriesPayload>,
) -> (StatusCode, Json<AckResponse>) {
    node.send_backup(req.entries).await;
    (StatusCode::OK, Json(AckResponse { success: true }))
}

pub async fn handle_remove_from_backup(
    Extension(node): Extension<Arc<ChordNode>>,
    Json(req): Json<EntriesPayload>,
) -> (StatusCode, Json<AckResponse>) {
    node.remove_from_backup(&req.entries).await;
    tracing::debug!(
        "{} pruned {} keys from its backup",
        node.address(),
        req.entries.len()
    );
    (StatusCode::OK, Json(AckResponse { success: true }))
}
