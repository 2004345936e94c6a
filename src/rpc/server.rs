//! Inbound side of the transport: one axum router exposing every remote method.

use axum::{
    Extension, Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::post,
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::chord::handlers::*;
use crate::chord::node::ChordNode;
use crate::chord::protocol::*;
use crate::error::ChordError;
use crate::storage::handlers::*;
use crate::storage::protocol::*;

/// Builds the router serving the full remote method surface of `node`.
pub fn router(node: Arc<ChordNode>) -> Router {
    Router::new()
        .route(ENDPOINT_FIND_SUCCESSOR, post(handle_find_successor))
        .route(ENDPOINT_GET_SUCCESSORS, post(handle_get_successors))
        .route(ENDPOINT_GET_PREDECESSOR, post(handle_get_predecessor))
        .route(ENDPOINT_NOTIFY, post(handle_notify))
        .route(ENDPOINT_SPLIT, post(handle_split))
        .route(ENDPOINT_RECEIVE_DATA, post(handle_receive_data))
        .route(ENDPOINT_PUT, post(handle_put))
        .route(ENDPOINT_GET, post(handle_get))
        .route(ENDPOINT_DELETE, post(handle_delete))
        .route(ENDPOINT_PUT_ON_BACKUP, post(handle_put_on_backup))
        .route(ENDPOINT_DELETE_ON_BACKUP, post(handle_delete_on_backup))
        .route(ENDPOINT_SEND_BACKUP, post(handle_send_backup))
        .route(ENDPOINT_REMOVE_FROM_BACKUP, post(handle_remove_from_backup))
        .layer(middleware::from_fn_with_state(node.clone(), reject_when_idle))
        .layer(Extension(node))
}

/// Serves `node` on an already bound listener until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, node: Arc<ChordNode>, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(node))
        .with_graceful_shutdown(shutdown)
        .await
}

/// A node that stopped listening must look dead to its peers.
async fn reject_when_idle(
    State(node): State<Arc<ChordNode>>,
    request: Request,
    next: Next,
) -> Response {
    if !node.is_listening() {
        tracing::trace!("{} refused {} while not listening", node.address(), request.uri());
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    next.run(request).await
}

/// HTTP status a handler answers with for a failed operation.
pub(crate) fn status_for(err: &ChordError) -> StatusCode {
    match err {
        ChordError::NotFound(_) => StatusCode::NOT_FOUND,
        ChordError::InvalidAddress(_) | ChordError::MalformedRecord { .. } => {
            StatusCode::BAD_REQUEST
        }
        ChordError::NotListening(_) => StatusCode::SERVICE_UNAVAILABLE,
        ChordError::AlreadyRunning(_) => StatusCode::CONFLICT,
        ChordError::Transport { .. }
        | ChordError::Timeout { .. }
        | ChordError::Routing(_)
        | ChordError::Remote { .. } => StatusCode::BAD_GATEWAY,
        ChordError::JoinFailure { .. } | ChordError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
