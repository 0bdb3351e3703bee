//! Experience storage for on-policy training
//!
//! [`rollout`] holds the fixed-horizon collection grids and the flattened
//! experience batch; [`gae`] computes advantages over a collected horizon.

pub mod gae;
pub mod rollout;

pub use rollout::{ExperienceBatch, RolloutBuffer, SubBatch};
