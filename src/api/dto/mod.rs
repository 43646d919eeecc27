//! Data Transfer Objects for REST request/response serialization.

pub mod common_dto;
pub mod event_dto;
pub mod instance_dto;
pub mod viewer_dto;

pub use common_dto::*;
pub use event_dto::*;
pub use instance_dto::*;
pub use viewer_dto::*;
