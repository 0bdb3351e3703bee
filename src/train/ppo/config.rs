//! Configuration for curiosity-driven PPO
//!
//! This module defines the hyperparameters for the training loop and
//! provides validation and builder pattern methods.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Hyperparameters for [`IcmPpoAlgo`](super::IcmPpoAlgo)
///
/// Defaults are the reference settings for gridworld instruction tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IcmPpoConfig {
    /// Rollout horizon per environment
    pub num_frames_per_proc: i64,

    /// Discount factor (gamma)
    pub discount: f64,

    /// Learning rate for both optimizers
    pub lr: f64,

    /// GAE lambda parameter
    pub gae_lambda: f64,

    /// Entropy bonus coefficient
    pub entropy_coef: f64,

    /// Value loss coefficient
    pub value_loss_coef: f64,

    /// Maximum gradient norm for clipping
    pub max_grad_norm: f64,

    /// Timesteps of recurrent memory propagation per minibatch
    pub recurrence: i64,

    /// Adam epsilon
    pub adam_eps: f64,

    /// PPO clipping parameter (epsilon)
    pub clip_eps: f64,

    /// Number of policy epochs per cycle
    pub epochs: usize,

    /// Policy minibatch size in frames
    pub batch_size: i64,

    /// Clamp range for intrinsic rewards
    pub intr_range: f64,

    /// Number of curiosity epochs per cycle
    pub icm_epochs: usize,

    /// Curiosity minibatch size in transitions
    pub icm_batch_size: usize,
}

impl Default for IcmPpoConfig {
    fn default() -> Self {
        Self {
            num_frames_per_proc: 128,
            discount: 0.99,
            lr: 0.001,
            gae_lambda: 0.95,
            entropy_coef: 0.01,
            value_loss_coef: 0.5,
            max_grad_norm: 0.5,
            recurrence: 4,
            adam_eps: 1e-8,
            clip_eps: 0.2,
            epochs: 4,
            batch_size: 256,
            intr_range: 0.004,
            icm_epochs: 10,
            icm_batch_size: 128,
        }
    }
}

impl IcmPpoConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.num_frames_per_proc <= 0 {
            return Err(anyhow!("num_frames_per_proc must be positive"));
        }
        if !(0.0..=1.0).contains(&self.discount) {
            return Err(anyhow!("discount must be in [0, 1]"));
        }
        if self.lr <= 0.0 {
            return Err(anyhow!("lr must be positive"));
        }
        if !(0.0..=1.0).contains(&self.gae_lambda) {
            return Err(anyhow!("gae_lambda must be in [0, 1]"));
        }
        if self.entropy_coef < 0.0 {
            return Err(anyhow!("entropy_coef must be non-negative"));
        }
        if self.value_loss_coef < 0.0 {
            return Err(anyhow!("value_loss_coef must be non-negative"));
        }
        if self.max_grad_norm <= 0.0 {
            return Err(anyhow!("max_grad_norm must be positive"));
        }
        if self.recurrence <= 0 {
            return Err(anyhow!("recurrence must be positive"));
        }
        if self.clip_eps <= 0.0 {
            return Err(anyhow!("clip_eps must be positive"));
        }
        if self.epochs == 0 {
            return Err(anyhow!("epochs must be positive"));
        }
        if self.batch_size <= 0 {
            return Err(anyhow!("batch_size must be positive"));
        }
        if self.batch_size % self.recurrence != 0 {
            return Err(anyhow!(
                "batch_size ({}) must be divisible by recurrence ({})",
                self.batch_size,
                self.recurrence
            ));
        }
        if self.num_frames_per_proc % self.recurrence != 0 {
            return Err(anyhow!(
                "num_frames_per_proc ({}) must be divisible by recurrence ({})",
                self.num_frames_per_proc,
                self.recurrence
            ));
        }
        if self.intr_range < 0.0 {
            return Err(anyhow!("intr_range must be non-negative"));
        }
        if self.icm_batch_size == 0 {
            return Err(anyhow!("icm_batch_size must be positive"));
        }
        Ok(())
    }

    /// Set the rollout horizon per environment
    pub fn num_frames_per_proc(mut self, frames: i64) -> Self {
        self.num_frames_per_proc = frames;
        self
    }

    /// Set the discount factor
    pub fn discount(mut self, discount: f64) -> Self {
        self.discount = discount;
        self
    }

    /// Set the learning rate
    pub fn lr(mut self, lr: f64) -> Self {
        self.lr = lr;
        self
    }

    /// Set the GAE lambda
    pub fn gae_lambda(mut self, lambda: f64) -> Self {
        self.gae_lambda = lambda;
        self
    }

    /// Set the entropy coefficient
    pub fn entropy_coef(mut self, coef: f64) -> Self {
        self.entropy_coef = coef;
        self
    }

    /// Set the value loss coefficient
    pub fn value_loss_coef(mut self, coef: f64) -> Self {
        self.value_loss_coef = coef;
        self
    }

    /// Set the maximum gradient norm
    pub fn max_grad_norm(mut self, norm: f64) -> Self {
        self.max_grad_norm = norm;
        self
    }

    /// Set the recurrence length
    pub fn recurrence(mut self, recurrence: i64) -> Self {
        self.recurrence = recurrence;
        self
    }

    /// Set the Adam epsilon
    pub fn adam_eps(mut self, eps: f64) -> Self {
        self.adam_eps = eps;
        self
    }

    /// Set the PPO clipping parameter
    pub fn clip_eps(mut self, eps: f64) -> Self {
        self.clip_eps = eps;
        self
    }

    /// Set the number of policy epochs
    pub fn epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    /// Set the policy minibatch size
    pub fn batch_size(mut self, size: i64) -> Self {
        self.batch_size = size;
        self
    }

    /// Set the intrinsic reward clamp range
    pub fn intr_range(mut self, range: f64) -> Self {
        self.intr_range = range;
        self
    }

    /// Set the number of curiosity epochs
    pub fn icm_epochs(mut self, epochs: usize) -> Self {
        self.icm_epochs = epochs;
        self
    }

    /// Set the curiosity minibatch size
    pub fn icm_batch_size(mut self, size: usize) -> Self {
        self.icm_batch_size = size;
        self
    }
}
