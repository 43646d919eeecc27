//! Lifecycle event intake.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::PublishEventResponse;
use crate::app_state::AppState;
use crate::domain::DomainEvent;
use crate::error::{ErrorResponse, GatewayError};

/// `POST /events` — Publish a lifecycle event to observers.
///
/// Player and ban list events are produced by the instance channels only.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] for channel-owned event kinds.
#[utoipa::path(
    post,
    path = "/api/v1/events",
    tag = "Events",
    summary = "Publish a lifecycle event",
    description = "Fans a `created`, `updated` or `deleted` event out to every observer. Viewers listed in `affected_observers` reload their roles before the event is filtered for them.",
    request_body = DomainEvent,
    responses(
        (status = 202, description = "Event published", body = PublishEventResponse),
        (status = 400, description = "Event kind not accepted", body = ErrorResponse),
    )
)]
pub async fn publish_event(
    State(state): State<AppState>,
    Json(event): Json<DomainEvent>,
) -> Result<impl IntoResponse, GatewayError> {
    if matches!(
        event,
        DomainEvent::PlayersChanged { .. } | DomainEvent::BanListChanged { .. }
    ) {
        return Err(GatewayError::InvalidRequest(format!(
            "{} events are produced by the gateway",
            event.kind().as_str()
        )));
    }

    let kind = event.kind().as_str();
    let instance_id = event.instance_id();
    let receivers = state.event_bus.publish(event);
    tracing::debug!(kind, ?instance_id, receivers, "lifecycle event published");

    Ok((
        StatusCode::ACCEPTED,
        Json(PublishEventResponse {
            kind,
            channel: state.event_bus.channel_name().to_string(),
            receivers,
        }),
    ))
}

/// Event routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/events", post(publish_event))
}
