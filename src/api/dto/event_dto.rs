//! Event publication DTOs.

use serde::Serialize;
use utoipa::ToSchema;

/// Response body for `POST /events` (202 Accepted).
#[derive(Debug, Serialize, ToSchema)]
pub struct PublishEventResponse {
    /// Event kind published.
    pub kind: &'static str,
    /// Channel the event was published on.
    pub channel: String,
    /// Subscribers the event was handed to.
    pub receivers: usize,
}
