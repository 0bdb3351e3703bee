//! Environment traits and implementations
//!
//! This module defines the core environment interface and provides the
//! built-in gridworld instruction-following environments.

use anyhow::Result;

use crate::obs::GridObs;

/// Core trait for RL environments
pub trait Environment: Send {
    /// Reset the environment, optionally reseeding layout generation,
    /// and return the initial observation
    fn reset(&mut self, seed: Option<u64>) -> Result<GridObs>;

    /// Step the environment with a discrete action
    fn step(&mut self, action: i64) -> Result<StepResult>;

    /// Get the observation space dimensions
    fn observation_space(&self) -> SpaceInfo;

    /// Get the action space dimensions
    fn action_space(&self) -> SpaceInfo;
}

/// Result of an environment step
#[derive(Debug, Clone)]
pub struct StepResult {
    /// Next observation
    pub observation: GridObs,

    /// Reward received
    pub reward: f32,

    /// Whether the episode terminated
    pub terminated: bool,

    /// Whether the episode was truncated
    pub truncated: bool,

    /// Additional info
    pub info: StepInfo,
}

/// Space information for observations and actions
#[derive(Debug, Clone)]
pub struct SpaceInfo {
    /// Shape of the space
    pub shape: Vec<usize>,

    /// Data type
    pub space_type: SpaceType,
}

impl SpaceInfo {
    /// Number of discrete choices, if this is a discrete space
    pub fn discrete_n(&self) -> Option<usize> {
        match self.space_type {
            SpaceType::Discrete(n) => Some(n),
            _ => None,
        }
    }
}

/// Space data types
#[derive(Debug, Clone, Copy)]
pub enum SpaceType {
    /// Discrete space with n options
    Discrete(usize),

    /// Continuous space (Box)
    Continuous,
}

/// Additional step information
#[derive(Debug, Clone, Default)]
pub struct StepInfo {
    /// Mission text for instruction-following environments
    pub mission: Option<String>,
}

pub mod goto;
pub mod pool;
