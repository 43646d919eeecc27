//! Service layer: orchestration of instance channels.
//!
//! [`FleetSynchronizer`] owns the set of tracked instances and the
//! lifecycle of their [`crate::management::InstanceChannel`]s.

pub mod fleet_synchronizer;

pub use fleet_synchronizer::{FleetSynchronizer, TrackedInstance};
