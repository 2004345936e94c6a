use axum::{Extension, Json, http::StatusCode};
use std::sync::Arc;

use super::node::ChordNode;
use super::protocol::{
    AddressResponse, DataResponse, FindSuccessorRequest, NotifyRequest, PredecessorResponse,
    SplitRequest, SuccessorListResponse,
};
use crate::rpc::server::status_for;
use crate::storage::protocol::AckResponse;

pub async fn handle_find_successor(
    Extension(node): Extension<Arc<ChordNode>>,
    Json(req): Json<FindSuccessorRequest>,
) -> (StatusCode, Json<AddressResponse>) {
    match node.find_successor(&req.id, req.hops).await {
        Ok(address) => (
            StatusCode::OK,
            Json(AddressResponse {
                address: Some(address),
            }),
        ),
        Err(e) => {
            tracing::debug!("FindSuccessor at {} failed: {}", node.address(), e);
            (status_for(&e), Json(AddressResponse { address: None }))
        }
    }
}

pub async fn handle_get_successors(
    Extension(node): Extension<Arc<ChordNode>>,
) -> (StatusCode, Json<SuccessorListResponse>) {
    let successors = node.successor_list().await;
    (StatusCode::OK, Json(SuccessorListResponse { successors }))
}

pub async fn handle_get_predecessor(
    Extension(node): Extension<Arc<ChordNode>>,
) -> (StatusCode, Json<PredecessorResponse>) {
    let predecessor = node.predecessor().await;
    (StatusCode::OK, Json(PredecessorResponse { predecessor }))
}

pub async fn handle_notify(
    Extension(node): Extension<Arc<ChordNode>>,
    Json(req): Json<NotifyRequest>,
) -> (StatusCode, Json<AckResponse>) {
    match node.notify(&req.candidate).await {
        Ok(()) => (StatusCode::OK, Json(AckResponse { success: true })),
        Err(e) => {
            tracing::error!("Notify from {} at {}: {}", req.candidate, node.address(), e);
            (status_for(&e), Json(AckResponse { success: false }))
        }
    }
}

pub async fn handle_split(
    Extension(node): Extension<Arc<ChordNode>>,
    Json(req): Json<SplitRequest>,
) -> (StatusCode, Json<DataResponse>) {
    // runs to completion even if the joining node hangs up
    let split = {
        let node = node.clone();
        let address = req.address.clone();
        tokio::spawn(async move { node.split_into_predecessor(&address).await })
    };

    match split.await {
        Ok(Ok(entries)) => (StatusCode::OK, Json(DataResponse { entries })),
        Ok(Err(e)) => {
            tracing::error!("Split for {} at {}: {}", req.address, node.address(), e);
            (status_for(&e), Json(DataResponse::default()))
        }
        Err(e) => {
            tracing::error!("Split task for {} at {} failed: {}", req.address, node.address(), e);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(DataResponse::default()))
        }
    }
}

pub async fn handle_receive_data(
    Extension(node): Extension<Arc<ChordNode>>,
) -> (StatusCode, Json<DataResponse>) {
    let entries = node.receive_data().await;
    (StatusCode::OK, Json(DataResponse { entries }))
}
