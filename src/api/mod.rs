//! REST API layer: route handlers, DTOs, and router composition.
//!
//! All resource endpoints are mounted under `/api/v1`. The WebSocket
//! endpoint lives at `/ws` and the OpenAPI document at
//! `/api-docs/openapi.json`.

pub mod dto;
pub mod handlers;

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::app_state::AppState;
use crate::ws::handler::ws_handler;

/// OpenAPI description of the REST surface.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "fleet-gateway",
        description = "Status synchronization and observer gateway for a fleet of game-server instances."
    ),
    paths(
        handlers::system::health_handler,
        handlers::instance::track_instance,
        handlers::instance::list_instances,
        handlers::instance::untrack_instance,
        handlers::instance::invalidate_status,
        handlers::instance::get_status,
        handlers::instance::get_connection,
        handlers::event::publish_event,
        handlers::viewer::grant_role,
        handlers::viewer::revoke_viewer,
    ),
    tags(
        (name = "System", description = "Service health"),
        (name = "Instances", description = "Tracked instances and their cached status"),
        (name = "Events", description = "Lifecycle event intake"),
        (name = "Viewers", description = "Viewer roles"),
    )
)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes())
}

/// Builds the full application: REST, WebSocket, API docs and HTTP layers.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(build_router())
        .route("/ws", get(ws_handler))
        .merge(docs_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(feature = "swagger-ui")]
fn docs_routes() -> Router<AppState> {
    utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}

#[cfg(not(feature = "swagger-ui"))]
fn docs_routes() -> Router<AppState> {
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { axum::Json(ApiDoc::openapi()) }),
    )
}
