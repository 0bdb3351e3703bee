//! Vectorized environment pool
//!
//! Steps N environment instances for one batched action vector using
//! Rayon's thread pool. An instance whose episode just ended is reset in
//! place, so the observation slot always holds a live episode start — the
//! done flags for the finished step are still reported to the caller.

use anyhow::Result;
use rayon::prelude::*;

use crate::env::{Environment, SpaceInfo};
use crate::obs::GridObs;

/// A pool of environments stepped as one batch
pub struct EnvPool<E: Environment> {
    envs: Vec<E>,
    num_envs: usize,
}

/// Result of stepping the whole pool once
#[derive(Debug, Clone)]
pub struct PoolStep {
    /// Observations for each environment (reset observation where done)
    pub observations: Vec<GridObs>,

    /// Rewards for each environment
    pub rewards: Vec<f32>,

    /// Termination flags for each environment
    pub terminated: Vec<bool>,

    /// Truncation flags for each environment
    pub truncated: Vec<bool>,
}

impl<E: Environment> EnvPool<E> {
    /// Create a pool from a factory function
    pub fn new<F>(env_fn: F, num_envs: usize) -> Self
    where
        F: Fn() -> E,
    {
        assert!(num_envs > 0, "pool needs at least one environment");
        let envs = (0..num_envs).map(|_| env_fn()).collect();
        Self { envs, num_envs }
    }

    /// Reset all environments, seeding each from `seed + index` when a
    /// base seed is given
    pub fn reset(&mut self, seed: Option<u64>) -> Result<Vec<GridObs>> {
        self.envs
            .par_iter_mut()
            .enumerate()
            .map(|(i, env)| env.reset(seed.map(|s| s + i as u64)))
            .collect()
    }

    /// Step all environments with one action each
    ///
    /// Environments whose episode ended are reset and their slot carries
    /// the fresh initial observation.
    ///
    /// # Panics
    ///
    /// Panics if the number of actions does not match the pool size.
    pub fn step(&mut self, actions: &[i64]) -> Result<PoolStep> {
        assert_eq!(
            actions.len(),
            self.num_envs,
            "number of actions must match number of environments"
        );

        let results: Result<Vec<_>> = self
            .envs
            .par_iter_mut()
            .zip(actions.par_iter())
            .map(|(env, &action)| {
                let result = env.step(action)?;
                let observation = if result.terminated || result.truncated {
                    env.reset(None)?
                } else {
                    result.observation
                };
                Ok((observation, result.reward, result.terminated, result.truncated))
            })
            .collect();

        let mut step = PoolStep {
            observations: Vec::with_capacity(self.num_envs),
            rewards: Vec::with_capacity(self.num_envs),
            terminated: Vec::with_capacity(self.num_envs),
            truncated: Vec::with_capacity(self.num_envs),
        };
        for (obs, reward, terminated, truncated) in results? {
            step.observations.push(obs);
            step.rewards.push(reward);
            step.terminated.push(terminated);
            step.truncated.push(truncated);
        }
        Ok(step)
    }

    /// Number of environments in the pool
    pub fn num_envs(&self) -> usize {
        self.num_envs
    }

    /// Observation space of the pooled environments
    pub fn observation_space(&self) -> SpaceInfo {
        self.envs[0].observation_space()
    }

    /// Action space of the pooled environments
    pub fn action_space(&self) -> SpaceInfo {
        self.envs[0].action_space()
    }
}
