//! Instance handlers: track, untrack and status reads.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get};
use axum::{Json, Router};

use crate::api::dto::{
    ConnectionStatusDto, InstanceListResponse, InstanceSummaryDto, PaginationParams,
    StatusValueResponse, TrackInstanceRequest, TrackInstanceResponse,
};
use crate::app_state::AppState;
use crate::domain::{InstanceId, StatusKey};
use crate::error::{ErrorResponse, GatewayError};

/// `POST /instances` — Start synchronizing an instance.
#[utoipa::path(
    post,
    path = "/api/v1/instances",
    tag = "Instances",
    summary = "Track an instance",
    description = "Starts a status channel for the instance. Tracking an instance that is already tracked is a no-op.",
    request_body = TrackInstanceRequest,
    responses(
        (status = 201, description = "Channel started", body = TrackInstanceResponse),
        (status = 200, description = "Instance was already tracked", body = TrackInstanceResponse),
    )
)]
pub async fn track_instance(
    State(state): State<AppState>,
    Json(req): Json<TrackInstanceRequest>,
) -> impl IntoResponse {
    let instance_id = req.id;
    let started = state.fleet.track(req.into()).await;
    let status = if started {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    (
        status,
        Json(TrackInstanceResponse {
            instance_id,
            started,
        }),
    )
}

/// `GET /instances` — List tracked instances.
#[utoipa::path(
    get,
    path = "/api/v1/instances",
    tag = "Instances",
    summary = "List tracked instances",
    description = "Returns a paginated list of tracked instances with their connection state.",
    params(PaginationParams),
    responses(
        (status = 200, description = "Paginated instance list", body = InstanceListResponse),
    )
)]
pub async fn list_instances(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> impl IntoResponse {
    let summaries = state
        .fleet
        .tracked()
        .await
        .into_iter()
        .map(|t| InstanceSummaryDto {
            instance_id: t.id,
            loader: t.loader,
            state: t.status.state,
        })
        .collect();
    let (data, pagination) = params.paginate(summaries);
    Json(InstanceListResponse { data, pagination })
}

/// `DELETE /instances/{id}` — Stop synchronizing an instance.
///
/// The cached status is kept.
#[utoipa::path(
    delete,
    path = "/api/v1/instances/{id}",
    tag = "Instances",
    summary = "Untrack an instance",
    params(
        ("id" = uuid::Uuid, Path, description = "Instance UUID"),
    ),
    responses(
        (status = 204, description = "Instance is no longer tracked"),
    )
)]
pub async fn untrack_instance(
    State(state): State<AppState>,
    Path(id): Path<InstanceId>,
) -> StatusCode {
    state.fleet.untrack(id).await;
    StatusCode::NO_CONTENT
}

/// `DELETE /instances/{id}/status` — Drop the cached status.
#[utoipa::path(
    delete,
    path = "/api/v1/instances/{id}/status",
    tag = "Instances",
    summary = "Invalidate cached status",
    params(
        ("id" = uuid::Uuid, Path, description = "Instance UUID"),
    ),
    responses(
        (status = 204, description = "Cached status removed"),
    )
)]
pub async fn invalidate_status(
    State(state): State<AppState>,
    Path(id): Path<InstanceId>,
) -> StatusCode {
    state.fleet.invalidate(id).await;
    StatusCode::NO_CONTENT
}

/// `GET /instances/{id}/status/{key}` — Read one status field.
///
/// # Errors
///
/// Returns [`GatewayError::StatusUnknown`] if nothing was reported yet.
#[utoipa::path(
    get,
    path = "/api/v1/instances/{id}/status/{key}",
    tag = "Instances",
    summary = "Read instance status",
    description = "Returns the last reported value of `players` or `bans`.",
    params(
        ("id" = uuid::Uuid, Path, description = "Instance UUID"),
        ("key" = StatusKey, Path, description = "Status field"),
    ),
    responses(
        (status = 200, description = "Last reported value", body = StatusValueResponse),
        (status = 404, description = "Value unknown", body = ErrorResponse),
    )
)]
pub async fn get_status(
    State(state): State<AppState>,
    Path((instance_id, key)): Path<(InstanceId, StatusKey)>,
) -> Result<Json<StatusValueResponse>, GatewayError> {
    let value = state
        .fleet
        .store()
        .get(instance_id, key)
        .await
        .ok_or(GatewayError::StatusUnknown { instance_id, key })?;
    Ok(Json(StatusValueResponse {
        instance_id,
        key,
        value,
    }))
}

/// `GET /instances/{id}/connection` — Channel state of a tracked instance.
///
/// # Errors
///
/// Returns [`GatewayError::InstanceNotTracked`] for unknown instances.
#[utoipa::path(
    get,
    path = "/api/v1/instances/{id}/connection",
    tag = "Instances",
    summary = "Connection state",
    params(
        ("id" = uuid::Uuid, Path, description = "Instance UUID"),
    ),
    responses(
        (status = 200, description = "Channel state", body = ConnectionStatusDto),
        (status = 404, description = "Instance not tracked", body = ErrorResponse),
    )
)]
pub async fn get_connection(
    State(state): State<AppState>,
    Path(id): Path<InstanceId>,
) -> Result<Json<ConnectionStatusDto>, GatewayError> {
    let status = state
        .fleet
        .channel_status(id)
        .await
        .ok_or(GatewayError::InstanceNotTracked(id))?;
    Ok(Json(ConnectionStatusDto::new(id, status)))
}

/// Instance routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/instances", get(list_instances).post(track_instance))
        .route("/instances/{id}", delete(untrack_instance))
        .route("/instances/{id}/status", delete(invalidate_status))
        .route("/instances/{id}/status/{key}", get(get_status))
        .route("/instances/{id}/connection", get(get_connection))
}
