//! Instance tracking and status DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::common_dto::PaginationMeta;
use crate::domain::{InstanceId, InstanceRef, Loader, StatusKey};
use crate::management::{ChannelStatus, ConnectionState};

/// Request body for `POST /instances`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TrackInstanceRequest {
    /// Instance identifier assigned by the lifecycle layer.
    pub id: InstanceId,
    /// Bearer secret of the instance's management endpoint.
    pub management_secret: String,
    /// Platform the instance runs.
    pub loader: Loader,
}

impl From<TrackInstanceRequest> for InstanceRef {
    fn from(req: TrackInstanceRequest) -> Self {
        Self::new(req.id, req.management_secret, req.loader)
    }
}

/// Response body for `POST /instances`.
#[derive(Debug, Serialize, ToSchema)]
pub struct TrackInstanceResponse {
    /// Instance identifier.
    pub instance_id: InstanceId,
    /// `true` if this request started the channel.
    pub started: bool,
}

/// Channel state of one tracked instance.
#[derive(Debug, Serialize, ToSchema)]
pub struct ConnectionStatusDto {
    /// Instance identifier.
    pub instance_id: InstanceId,
    /// Current connection state.
    pub state: ConnectionState,
    /// Consecutive failed attempts.
    pub consecutive_failures: u32,
    /// Delay before the next attempt, in seconds.
    pub current_backoff_secs: f64,
}

impl ConnectionStatusDto {
    /// Builds the DTO from a channel status.
    #[must_use]
    pub fn new(instance_id: InstanceId, status: ChannelStatus) -> Self {
        Self {
            instance_id,
            state: status.state,
            consecutive_failures: status.consecutive_failures,
            current_backoff_secs: status.current_backoff.as_secs_f64(),
        }
    }
}

/// Tracked instance summary for list responses.
#[derive(Debug, Serialize, ToSchema)]
pub struct InstanceSummaryDto {
    /// Instance identifier.
    pub instance_id: InstanceId,
    /// Platform the instance runs.
    pub loader: Loader,
    /// Current connection state.
    pub state: ConnectionState,
}

/// Paginated list response for `GET /instances`.
#[derive(Debug, Serialize, ToSchema)]
pub struct InstanceListResponse {
    /// Instances on this page.
    pub data: Vec<InstanceSummaryDto>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}

/// Response body for `GET /instances/{id}/status/{key}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatusValueResponse {
    /// Instance identifier.
    pub instance_id: InstanceId,
    /// Field returned.
    pub key: StatusKey,
    /// Last reported value.
    pub value: serde_json::Value,
}
