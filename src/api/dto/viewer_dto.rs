//! Viewer role DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{InstanceId, Role, ViewerId};

/// Request body for `PUT /viewers/{viewer}/roles/{id}`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct GrantRoleRequest {
    /// New role; `none` revokes access.
    pub role: Role,
}

/// Response body for `PUT /viewers/{viewer}/roles/{id}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct GrantRoleResponse {
    /// Viewer whose role changed.
    pub viewer_id: ViewerId,
    /// Instance the role applies to.
    pub instance_id: InstanceId,
    /// Role now held.
    pub role: Role,
}
