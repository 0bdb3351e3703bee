//! # curio-rl
//!
//! Curiosity-driven reinforcement learning in Rust + tch-rs: gridworld
//! instruction-following environments and a PPO training loop augmented
//! with an intrinsic curiosity module for exploration bonuses.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use curio_rl::env::{goto::GoToEnv, pool::EnvPool};
//! use curio_rl::obs::ObsPreprocessor;
//! use curio_rl::policy::{GridPolicy, GridPolicyConfig};
//! use curio_rl::train::{IcmPpoAlgo, IcmPpoConfig};
//! use tch::Device;
//!
//! let device = Device::cuda_if_available();
//! let envs = EnvPool::new(|| GoToEnv::go_to_obj(7, 3), 16);
//! let policy = GridPolicy::new(7, 7, 3, 3, GridPolicyConfig::default(), device);
//! let preprocessor = ObsPreprocessor::new(7, 7, 3);
//!
//! let mut algo = IcmPpoAlgo::new(
//!     envs,
//!     policy,
//!     preprocessor,
//!     IcmPpoConfig::default(),
//!     device,
//!     None,
//!     Some(0),
//! )
//! .unwrap();
//!
//! let (mut exps, rollout_logs) = algo.collect_experiences().unwrap();
//! let update_logs = algo.update_parameters(&mut exps).unwrap();
//! println!("entropy {:.3}, frames {}", update_logs.entropy, rollout_logs.num_frames);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Experience buffers and advantage estimation
pub mod buffer;

/// Intrinsic curiosity module
pub mod curiosity;

/// Environment traits and gridworld implementations
pub mod env;

/// Observation types and preprocessing
pub mod obs;

/// Policy and neural network implementations
pub mod policy;

/// Training algorithms
pub mod train;

/// Current version of curio-rl
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
