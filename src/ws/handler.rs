//! Axum WebSocket upgrade handler.

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::HeaderMap;
use axum::response::IntoResponse;

use super::authorization::AuthorizationError;
use super::connection::run_connection;
use crate::app_state::AppState;
use crate::domain::{AuthorizationSnapshot, ViewerId};
use crate::error::GatewayError;

/// Header carrying the viewer identity, set by the upstream auth layer.
pub const VIEWER_HEADER: &str = "x-viewer-id";

/// `GET /ws` — Upgrade HTTP connection to WebSocket.
///
/// The viewer's roles are loaded once here; viewers without any roles on
/// record start with an empty snapshot and only see fleet-wide events and
/// deletions until a role change names them.
///
/// # Errors
///
/// Returns [`GatewayError::Unauthorized`] without a valid viewer header and
/// [`GatewayError::AuthorizationUnavailable`] if roles cannot be loaded.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, GatewayError> {
    let viewer = viewer_from_headers(&headers)?;
    let initial = match state.gateway.authorizations().load(viewer).await {
        Ok(snapshot) => snapshot,
        Err(AuthorizationError::UnknownViewer(_)) => AuthorizationSnapshot::new(),
        Err(e) => return Err(e.into()),
    };
    let subscription = state.gateway.accept(viewer, initial);

    Ok(ws.on_upgrade(move |socket| run_connection(socket, subscription)))
}

/// Extracts the viewer identity from [`VIEWER_HEADER`].
///
/// # Errors
///
/// Returns [`GatewayError::Unauthorized`] if the header is missing or not
/// a UUID.
pub fn viewer_from_headers(headers: &HeaderMap) -> Result<ViewerId, GatewayError> {
    headers
        .get(VIEWER_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
        .ok_or(GatewayError::Unauthorized)
}
