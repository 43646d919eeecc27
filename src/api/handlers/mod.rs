//! REST endpoint handlers organized by resource.

pub mod event;
pub mod instance;
pub mod system;
pub mod viewer;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(instance::routes())
        .merge(event::routes())
        .merge(viewer::routes())
}
