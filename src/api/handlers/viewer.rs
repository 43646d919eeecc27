//! Viewer role management.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, put};
use axum::{Json, Router};
use chrono::Utc;

use crate::api::dto::{GrantRoleRequest, GrantRoleResponse};
use crate::app_state::AppState;
use crate::domain::{DomainEvent, InstanceId, ViewerId};
use crate::error::{ErrorResponse, GatewayError};

/// `PUT /viewers/{viewer}/roles/{id}` — Set a viewer's role on an instance.
///
/// Publishes an `updated` event naming the viewer so that open
/// subscriptions reload their roles before the next instance event.
#[utoipa::path(
    put,
    path = "/api/v1/viewers/{viewer}/roles/{id}",
    tag = "Viewers",
    summary = "Set viewer role",
    params(
        ("viewer" = uuid::Uuid, Path, description = "Viewer UUID"),
        ("id" = uuid::Uuid, Path, description = "Instance UUID"),
    ),
    request_body = GrantRoleRequest,
    responses(
        (status = 200, description = "Role stored", body = GrantRoleResponse),
    )
)]
pub async fn grant_role(
    State(state): State<AppState>,
    Path((viewer_id, instance_id)): Path<(ViewerId, InstanceId)>,
    Json(req): Json<GrantRoleRequest>,
) -> Json<GrantRoleResponse> {
    state
        .authorizations
        .grant(viewer_id, instance_id, req.role)
        .await;
    state.event_bus.publish(DomainEvent::Updated {
        instance_id: Some(instance_id),
        affected_observers: Some(vec![viewer_id]),
        timestamp: Utc::now(),
    });
    tracing::info!(%viewer_id, %instance_id, role = %req.role, "viewer role changed");

    Json(GrantRoleResponse {
        viewer_id,
        instance_id,
        role: req.role,
    })
}

/// `DELETE /viewers/{viewer}` — Remove every role of a viewer.
///
/// # Errors
///
/// Returns [`GatewayError::UnknownViewer`] if the viewer has no roles on
/// record.
#[utoipa::path(
    delete,
    path = "/api/v1/viewers/{viewer}",
    tag = "Viewers",
    summary = "Revoke viewer",
    params(
        ("viewer" = uuid::Uuid, Path, description = "Viewer UUID"),
    ),
    responses(
        (status = 204, description = "Viewer revoked"),
        (status = 404, description = "Viewer unknown", body = ErrorResponse),
    )
)]
pub async fn revoke_viewer(
    State(state): State<AppState>,
    Path(viewer_id): Path<ViewerId>,
) -> Result<StatusCode, GatewayError> {
    if !state.authorizations.revoke(viewer_id).await {
        return Err(GatewayError::UnknownViewer(viewer_id));
    }
    state.event_bus.publish(DomainEvent::Updated {
        instance_id: None,
        affected_observers: Some(vec![viewer_id]),
        timestamp: Utc::now(),
    });
    tracing::info!(%viewer_id, "viewer revoked");
    Ok(StatusCode::NO_CONTENT)
}

/// Viewer routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/viewers/{viewer}", delete(revoke_viewer))
        .route("/viewers/{viewer}/roles/{id}", put(grant_role))
}
