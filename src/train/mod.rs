//! Training algorithms
//!
//! This module implements the curiosity-driven PPO training loop.

pub mod ppo;

pub use ppo::{
    batch_starting_indexes, EpisodeTracker, IcmPpoAlgo, IcmPpoConfig, RewardReshaper,
    RolloutLogs, UpdateLogs,
};
