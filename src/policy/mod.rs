//! Policy and neural network implementations
//!
//! Defines the actor-critic interface the training loop drives, the
//! categorical action distribution, and the built-in gridworld policy.

use tch::{nn, Tensor};

use crate::obs::BatchedObs;

pub mod distribution;
pub mod grid_policy;

pub use distribution::Categorical;
pub use grid_policy::{GridPolicy, GridPolicyConfig};

/// Actor-critic network interface
///
/// Recurrence is a declared capability: callers check [`recurrent`] once
/// per call site and pick the matching forward variant, rather than
/// probing the model at runtime.
///
/// [`recurrent`]: ActorCritic::recurrent
pub trait ActorCritic {
    /// Whether the model carries recurrent memory between steps
    fn recurrent(&self) -> bool;

    /// Size of the full memory vector passed between steps
    fn memory_size(&self) -> i64;

    /// Size of the embedding half of the memory (the curiosity module
    /// sizes its encoder input off this)
    fn semi_memory_size(&self) -> i64;

    /// Forward pass for non-recurrent models
    fn forward(&self, obs: &BatchedObs) -> (Categorical, Tensor);

    /// Forward pass for recurrent models: also consumes and produces the
    /// memory tensor `[batch, memory_size]`
    fn forward_recurrent(
        &self,
        obs: &BatchedObs,
        memory: &Tensor,
    ) -> (Categorical, Tensor, Tensor) {
        let (dist, value) = self.forward(obs);
        (dist, value, memory.shallow_clone())
    }

    /// Variable store holding the model parameters, used to build the
    /// policy optimizer
    fn var_store(&self) -> &nn::VarStore;
}
