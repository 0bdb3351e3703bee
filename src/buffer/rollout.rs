//! Rollout storage and the flattened experience batch
//!
//! # Buffer layout
//!
//! Collection grids are `[num_steps, num_envs]` tensors allocated once at
//! construction and overwritten in place each cycle. At the end of a cycle
//! they are flattened env-major — all timesteps of env 0, then env 1, and
//! so on — into an [`ExperienceBatch`] whose fields all share the leading
//! length `num_envs * num_steps`.

use tch::{Device, Kind, Tensor};

use crate::obs::{BatchedObs, GridObs};

/// Flatten a `[T, P]` grid into a `[P * T]` env-major vector
pub(crate) fn env_major(grid: &Tensor) -> Tensor {
    grid.transpose(0, 1).reshape([-1])
}

/// Fixed-horizon rollout grids, one row per timestep
pub struct RolloutBuffer {
    pub(crate) num_steps: i64,
    pub(crate) num_envs: i64,

    /// Pre-step observations `[T][P]`
    pub(crate) obss: Vec<Vec<GridObs>>,

    /// Recurrent memories `[T, P, M]` (single dummy column when memoryless)
    pub(crate) memories: Tensor,

    /// Episode liveness before the step `[T, P]`
    pub(crate) masks: Tensor,

    /// Sampled actions `[T, P]`
    pub(crate) actions: Tensor,

    /// Value estimates `[T, P]`
    pub(crate) values: Tensor,

    /// Rewards, reshaped if a reshaper is configured `[T, P]`
    pub(crate) rewards: Tensor,

    /// Computed advantages `[T, P]`
    pub(crate) advantages: Tensor,

    /// Log probabilities of the sampled actions `[T, P]`
    pub(crate) log_probs: Tensor,
}

impl RolloutBuffer {
    /// Allocate grids for `num_steps` timesteps of `num_envs` environments
    pub fn new(num_steps: i64, num_envs: i64, memory_size: i64, device: Device) -> Self {
        let opts = (Kind::Float, device);
        Self {
            num_steps,
            num_envs,
            obss: vec![Vec::new(); num_steps as usize],
            memories: Tensor::zeros([num_steps, num_envs, memory_size.max(1)], opts),
            masks: Tensor::zeros([num_steps, num_envs], opts),
            actions: Tensor::zeros([num_steps, num_envs], (Kind::Int64, device)),
            values: Tensor::zeros([num_steps, num_envs], opts),
            rewards: Tensor::zeros([num_steps, num_envs], opts),
            advantages: Tensor::zeros([num_steps, num_envs], opts),
            log_probs: Tensor::zeros([num_steps, num_envs], opts),
        }
    }

    /// Write one collection step into row `step`
    #[allow(clippy::too_many_arguments)]
    pub fn write_step(
        &mut self,
        step: i64,
        obs: &[GridObs],
        memory: Option<&Tensor>,
        mask: &Tensor,
        action: &Tensor,
        value: &Tensor,
        reward: &Tensor,
        log_prob: &Tensor,
    ) {
        debug_assert!(step < self.num_steps, "step {step} out of bounds");
        debug_assert_eq!(obs.len() as i64, self.num_envs, "observation row size mismatch");

        self.obss[step as usize] = obs.to_vec();
        if let Some(memory) = memory {
            self.memories.get(step).copy_(memory);
        }
        self.masks.get(step).copy_(mask);
        self.actions.get(step).copy_(action);
        self.values.get(step).copy_(value);
        self.rewards.get(step).copy_(reward);
        self.log_probs.get(step).copy_(log_prob);
    }

    /// Horizon length
    pub fn num_steps(&self) -> i64 {
        self.num_steps
    }

    /// Number of parallel environments
    pub fn num_envs(&self) -> i64 {
        self.num_envs
    }

    /// Total frames per collection cycle
    pub fn num_frames(&self) -> i64 {
        self.num_steps * self.num_envs
    }

    /// Stored observations in env-major order
    pub fn flat_obs(&self) -> Vec<GridObs> {
        let mut flat = Vec::with_capacity(self.num_frames() as usize);
        for env in 0..self.num_envs as usize {
            for step in 0..self.num_steps as usize {
                flat.push(self.obss[step][env].clone());
            }
        }
        flat
    }

    /// Consecutive observation pairs per env, env-major
    ///
    /// Per environment, the first observation is dropped from the "next"
    /// list and the last from the "current" list, so each list holds
    /// `num_steps - 1` entries per env.
    pub fn transition_pairs(&self) -> (Vec<GridObs>, Vec<GridObs>) {
        let pairs = (self.num_envs * (self.num_steps - 1)) as usize;
        let mut curr = Vec::with_capacity(pairs);
        let mut next = Vec::with_capacity(pairs);
        for env in 0..self.num_envs as usize {
            for step in 0..self.num_steps as usize - 1 {
                curr.push(self.obss[step][env].clone());
                next.push(self.obss[step + 1][env].clone());
            }
        }
        (curr, next)
    }

    /// Flatten the grids into an experience batch
    ///
    /// `obs` is the env-major preprocessed observation batch; `memory` is
    /// included only for recurrent policies.
    pub fn flatten(&self, obs: BatchedObs, recurrent: bool) -> ExperienceBatch {
        let value = env_major(&self.values);
        let advantage = env_major(&self.advantages);
        let returns = &value + &advantage;

        let memory_size = *self.memories.size().last().unwrap();
        let memory = recurrent
            .then(|| self.memories.transpose(0, 1).reshape([-1, memory_size]));

        ExperienceBatch {
            obs,
            memory,
            mask: env_major(&self.masks).unsqueeze(1),
            action: env_major(&self.actions),
            value,
            reward: env_major(&self.rewards),
            advantage,
            returns,
            log_prob: env_major(&self.log_probs),
        }
    }
}

/// Flattened experience from one collection cycle
///
/// Parallel arrays, one entry per (env, timestep) pair in env-major order.
/// The memory field is deliberately rewritten between training epochs: the
/// policy trainer stores each sub-step's detached next memory back so the
/// following epoch starts recurrent sequences from refreshed states.
pub struct ExperienceBatch {
    /// Preprocessed observations `[N, ...]`
    pub obs: BatchedObs,

    /// Recurrent memories `[N, M]`, present for recurrent policies
    pub memory: Option<Tensor>,

    /// Episode liveness `[N, 1]`
    pub mask: Tensor,

    /// Actions `[N]`
    pub action: Tensor,

    /// Value estimates `[N]`
    pub value: Tensor,

    /// Rewards `[N]`
    pub reward: Tensor,

    /// Advantages `[N]`
    pub advantage: Tensor,

    /// Returns, `value + advantage` elementwise `[N]`
    pub returns: Tensor,

    /// Behavior log probabilities `[N]`
    pub log_prob: Tensor,
}

impl ExperienceBatch {
    /// Number of (env, timestep) entries
    pub fn len(&self) -> i64 {
        self.action.size()[0]
    }

    /// Check if the batch is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Select a training sub-batch by index tensor
    pub fn index(&self, indexes: &Tensor) -> SubBatch {
        let indexes = indexes.to_device(self.action.device());
        SubBatch {
            obs: self.obs.index_select(&indexes),
            mask: self.mask.index_select(0, &indexes),
            action: self.action.index_select(0, &indexes),
            value: self.value.index_select(0, &indexes),
            advantage: self.advantage.index_select(0, &indexes),
            returns: self.returns.index_select(0, &indexes),
            log_prob: self.log_prob.index_select(0, &indexes),
        }
    }
}

/// One minibatch sub-step slice of an [`ExperienceBatch`]
pub struct SubBatch {
    /// Preprocessed observations
    pub obs: BatchedObs,

    /// Episode liveness `[n, 1]`
    pub mask: Tensor,

    /// Actions `[n]`
    pub action: Tensor,

    /// Collection-time value estimates `[n]`
    pub value: Tensor,

    /// Advantages `[n]`
    pub advantage: Tensor,

    /// Returns `[n]`
    pub returns: Tensor,

    /// Collection-time log probabilities `[n]`
    pub log_prob: Tensor,
}
